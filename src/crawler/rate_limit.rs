//! Randomized delay floor between outbound requests

use crate::config::RateLimitConfig;
use rand::Rng;
use std::time::Duration;

/// Sleeps for a uniformly drawn delay before each request
///
/// One limiter belongs to one fetch sequence; it keeps no shared state.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_delay: Duration,
    max_delay: Duration,
}

impl RateLimiter {
    /// Creates a limiter drawing from `[min_delay, max_delay]`
    ///
    /// Reversed bounds are swapped.
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        if min_delay <= max_delay {
            Self {
                min_delay,
                max_delay,
            }
        } else {
            Self {
                min_delay: max_delay,
                max_delay: min_delay,
            }
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            Duration::from_millis(config.min_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Draws the next delay
    pub fn next_delay(&self) -> Duration {
        let min_ms = self.min_delay.as_millis() as u64;
        let max_ms = self.max_delay.as_millis() as u64;
        if min_ms >= max_ms {
            return self.min_delay;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
    }

    /// Blocks the caller for one drawn delay
    pub async fn wait(&self) {
        let delay = self.next_delay();
        tracing::debug!("Sleeping for {:.2} seconds", delay.as_secs_f64());
        tokio::time::sleep(delay).await;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}
