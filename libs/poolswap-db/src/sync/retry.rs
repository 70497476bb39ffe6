use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::SyncResult;

/// Exponential backoff for transient database failures. Validation errors
/// short-circuit: re-reading the same bad input cannot succeed.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after a failed attempt, 1-indexed: base, 2x base, 4x base, ...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }

    /// Drives `operation` until it succeeds, fails a non-retryable way, or
    /// exhausts the attempt budget. The last error is returned as-is.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> SyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(op = operation, attempt, "operation recovered after retry");
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => {
                    warn!(op = operation, error = %err, "operation failed, not retryable");
                    return Err(err);
                }
                Err(err) if attempt >= self.max_attempts => {
                    warn!(
                        op = operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "operation failed, attempts exhausted"
                    );
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        op = operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "operation failed, backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
