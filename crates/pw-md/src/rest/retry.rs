//! Bounded exponential-backoff retry.

use std::future::Future;
use std::time::Duration;

use pw_core::FetchError;
use tracing::{debug, warn};

/// Retry limits for one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1_000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Sleep after failed attempt `attempt` (1-indexed): `base * 2^(attempt-1)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exp)
    }
}

/// Run `op` until it succeeds, fails fatally, or the attempts run out.
///
/// A non-retryable error is returned as-is on whichever attempt it occurs.
/// After `max_attempts` retryable failures the last one is wrapped in
/// [`FetchError::MaxRetriesExceeded`].
pub async fn retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let err = match op().await {
            Ok(v) => return Ok(v),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => e,
        };

        if attempt >= policy.max_attempts {
            warn!("[retry-{label}] giving up after {attempt} attempts: {err}");
            return Err(FetchError::MaxRetriesExceeded {
                attempts: attempt,
                last: Box::new(err),
            });
        }

        let delay = policy.delay_after(attempt);
        debug!("[retry-{label}] attempt {attempt} failed ({err}), retrying in {delay:?}");
        tokio::time::sleep(delay).await;
    }
}
