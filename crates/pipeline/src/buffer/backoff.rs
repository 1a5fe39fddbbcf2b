//! Delivery retry schedule

use std::time::Duration;

use tributary_config::RetryConfig;

/// Exponential backoff between delivery attempts
///
/// The delay after the `n`th failure is
/// `initial_backoff * multiplier^(n-1)`, capped at `max_backoff`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Failed deliveries allowed before a chunk is dropped
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
            multiplier: config.multiplier,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after `failures` failed attempts (1-based)
    pub fn delay_for_attempt(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }

        // Microseconds keep precision for small delays
        let base_us =
            self.initial_backoff.as_micros() as f64 * self.multiplier.powi((failures - 1) as i32);
        let capped = base_us.min(self.max_backoff.as_micros() as f64);

        Duration::from_micros(capped as u64)
    }

    /// Whether a chunk with `failures` failed attempts may be retried
    #[inline]
    pub fn should_retry(&self, failures: u32) -> bool {
        failures < self.max_attempts
    }
}
