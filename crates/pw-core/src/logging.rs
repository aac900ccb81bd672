//! Logging initialization using the `tracing` ecosystem.
//!
//! The data layer only emits `tracing` events; installing a subscriber is
//! left to the embedding application. [`init_logging`] is the stock setup:
//! console output plus optional daily-rotated files, with `RUST_LOG`
//! overriding the default level.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format for every installed layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, colored on the console.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Install the global tracing subscriber.
///
/// Returns `false` when a subscriber was already installed (tests, or an
/// embedding app that set up its own); the existing one is left in place.
///
/// - `log_level`: default filter if `RUST_LOG` is not set (e.g. `"info"`,
///   `"pw_md=debug"`)
/// - `log_dir`: optional directory for daily-rotating log files
/// - `file_prefix`: log file name prefix (e.g. `"pairwatch"`)
pub fn init_logging(
    log_level: &str,
    log_dir: Option<&str>,
    file_prefix: &str,
    format: LogFormat,
) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let file_appender = log_dir.map(|dir| tracing_appender::rolling::daily(dir, file_prefix));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format {
        LogFormat::Pretty => {
            let console = fmt::layer().with_target(true).with_ansi(true);
            let file = file_appender.map(|w| fmt::layer().with_writer(w).with_ansi(false).with_target(true));
            registry.with(console).with(file).try_init()
        }
        LogFormat::Json => {
            let console = fmt::layer().json().with_target(true);
            let file = file_appender.map(|w| fmt::layer().json().with_writer(w).with_target(true));
            registry.with(console).with(file).try_init()
        }
    };
    result.is_ok()
}
