//! Bounded exponential backoff around generation calls.

use made_core::{Error as CoreError, RetryConfig};
use std::future::Future;
use std::time::Duration;
use tokio::time;

/// Retry and timeout policy applied to every generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Final failure of a retried call.
#[derive(Debug)]
pub struct RetryFailure {
    /// Attempts made, including the first
    pub attempts: u32,
    /// Error returned by the last attempt
    pub error: CoreError,
}

impl RetryPolicy {
    /// Builds the policy from run configuration.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms.max(config.base_delay_ms)),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    /// A policy that tries exactly once.
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            timeout,
        }
    }

    /// Overrides the per-call timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Backoff before retry number `attempt` (zero-based): `base * 2^attempt`, capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Runs `call` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Each attempt is bounded by the policy timeout; an elapsed timeout is
    /// reported as [`CoreError::Timeout`] and treated as transient.
    ///
    /// # Errors
    /// Returns the last error with the number of attempts made.
    pub async fn run<T, F, Fut>(&self, label: &str, mut call: F) -> Result<T, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = made_core::Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let outcome = match time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_elapsed) => Err(CoreError::Timeout(duration_ms(self.timeout))),
            };

            let error = match outcome {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !error.is_retryable() || attempt >= self.max_attempts {
                return Err(RetryFailure {
                    attempts: attempt,
                    error,
                });
            }

            let wait = self.delay(attempt - 1);
            tracing::warn!(
                label,
                attempt,
                max_attempts = self.max_attempts,
                wait_ms = duration_ms(wait),
                error = %error,
                "generation failed with retryable error, backing off"
            );
            time::sleep(wait).await;
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
