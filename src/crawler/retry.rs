//! Bounded exponential-backoff retries around a single request

use crate::config::RetryConfig;
use crate::crawler::FetchError;
use std::future::Future;
use std::time::Duration;

/// Retry policy for one network call
///
/// | Condition | Action |
/// |-----------|--------|
/// | Success | Return immediately |
/// | Retryable failure, attempts left | Wait `base * 2^(attempt-1)`, retry |
/// | Retryable failure, last attempt | Return `FetchFailed` without waiting |
/// | Non-retryable failure | Return the error as-is, no wait |
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base: Duration,
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` is clamped to at least one
    pub fn new(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.backoff_base_ms),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after failed attempt number `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base.saturating_mul(1u32 << exponent)
    }

    /// Runs `operation` until it succeeds or the policy gives up
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };

            if attempt >= self.max_attempts {
                tracing::error!("All {} attempts exhausted: {}", attempt, error);
                return Err(FetchError::FetchFailed {
                    attempts: attempt,
                    last: Box::new(error),
                });
            }

            let wait = self.backoff_for(attempt);
            tracing::warn!(
                "Attempt {}/{} failed: {}; retrying in {:.1}s",
                attempt,
                self.max_attempts,
                error,
                wait.as_secs_f64()
            );
            tokio::time::sleep(wait).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
