//! Typed error definitions for the data-acquisition layer.
//!
//! [`FetchError`] covers every way a REST call or a live connection can fail.
//! The variants split into two groups: transport failures that are worth
//! retrying (`Network`, `Timeout`, transient `Http` statuses) and terminal
//! failures that are surfaced to the caller as-is.

use std::time::Duration;

use thiserror::Error;

/// Failure of a REST fetch or a live-connection attempt.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Transport-level failure (DNS, TCP, TLS, connection reset).
    #[error("network error: {0}")]
    Network(String),

    /// The request did not complete within its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Upstream answered with a non-2xx status.
    #[error("http error: status {status} for {url}")]
    Http { status: u16, url: String },

    /// The direct call and every proxy mirror failed.
    #[error("all sources failed for {url}: {last}")]
    AllSourcesFailed {
        url: String,
        #[source]
        last: Box<FetchError>,
    },

    /// Out of retry attempts; wraps the final underlying error.
    #[error("failed after {attempts} attempts: {last}")]
    MaxRetriesExceeded {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },

    /// Payload did not have the expected shape.
    #[error("malformed data: {0}")]
    MalformedData(String),

    /// The exchange answered but refused the request (e.g. Bybit `retCode != 0`).
    #[error("exchange rejected request (code {code}): {message}")]
    ExchangeRejected { code: i64, message: String },

    /// Live connection could not be opened or lost its handshake.
    #[error("connection error: {0}")]
    Connection(String),
}

impl FetchError {
    /// Whether the retry controller should try again after this failure.
    ///
    /// An aggregate `AllSourcesFailed` inherits the classification of the last
    /// source's error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Http { status, .. } => is_transient_status(*status),
            Self::AllSourcesFailed { last, .. } => last.is_retryable(),
            Self::MaxRetriesExceeded { .. }
            | Self::MalformedData(_)
            | Self::ExchangeRejected { .. }
            | Self::Connection(_) => false,
        }
    }

    /// The innermost error, skipping the aggregate wrappers.
    pub fn root_cause(&self) -> &FetchError {
        match self {
            Self::AllSourcesFailed { last, .. } | Self::MaxRetriesExceeded { last, .. } => {
                last.root_cause()
            }
            other => other,
        }
    }
}

/// HTTP statuses that indicate a transient upstream condition.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 425 | 429 | 500..=599)
}
