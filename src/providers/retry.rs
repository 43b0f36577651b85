/*!
 * Bounded retry with exponential backoff and per-attempt timeouts.
 */

use log::{debug, warn};
use std::future::Future;
use std::time::Duration;

use crate::errors::ProviderError;

/// Longest single backoff sleep
const MAX_BACKOFF_MS: u64 = 30_000;

/// Retry budget for calls to an external service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base backoff time in milliseconds, doubled on each retry
    pub backoff_base_ms: u64,
    /// Time budget for a single attempt
    pub timeout: Duration,
}

/// Error returned when every attempt failed
#[derive(Debug, Clone)]
pub struct RetryFailure {
    /// Last error observed
    pub error: ProviderError,
    /// Attempts made, including the first
    pub attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 1000,
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base_ms: u64, timeout: Duration) -> Self {
        Self {
            max_retries,
            backoff_base_ms,
            timeout,
        }
    }

    /// Backoff before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let backoff_ms = self.backoff_base_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(backoff_ms.min(MAX_BACKOFF_MS))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent. Returns the value and the number of attempts made.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<(T, u32), RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            if attempt > 0 {
                debug!("{}: retry attempt {}/{}", label, attempt, self.max_retries);
            }

            let result = match tokio::time::timeout(self.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(format!(
                    "{} exceeded {}s",
                    label,
                    self.timeout.as_secs_f64()
                ))),
            };
            attempt += 1;

            match result {
                Ok(value) => return Ok((value, attempt)),
                Err(error) => {
                    if !error.is_retryable() || attempt > self.max_retries {
                        return Err(RetryFailure {
                            error,
                            attempts: attempt,
                        });
                    }
                    warn!(
                        "{} failed: {} - attempt {}/{}",
                        label,
                        error,
                        attempt,
                        self.max_retries + 1
                    );
                    tokio::time::sleep(self.backoff(attempt)).await;
                }
            }
        }
    }
}
