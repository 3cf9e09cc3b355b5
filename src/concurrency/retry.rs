use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use metrics::counter;
use tokio::time::sleep;
use tracing::warn;

/// Delay unit for linear backoff when none is configured.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(300);

const METRIC_RETRY_ATTEMPT: &str = "sourcedeck_retry_attempt_total";

/// How many extra attempts to make and how long to wait between them.
///
/// The wait before retry `n` (1-indexed) is `base_delay * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Wait applied after failed attempt `attempt` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt.saturating_add(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Call `operation` until it succeeds, the retry budget is spent, or
/// `should_retry` rejects the error.
///
/// Errors the predicate rejects are returned at once without sleeping.
pub async fn retry_with_backoff<T, E, Op, Fut, P>(
    mut operation: Op,
    policy: RetryPolicy,
    should_retry: P,
) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.retries && should_retry(&err) => {
                let delay = policy.delay_for(attempt);
                counter!(METRIC_RETRY_ATTEMPT).increment(1);
                warn!(
                    attempt = attempt + 1,
                    retries = policy.retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying after transient failure"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
