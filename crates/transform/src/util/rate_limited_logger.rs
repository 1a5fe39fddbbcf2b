//! Rate-limited warning logger
//!
//! A metadata endpoint that is down fails every lookup for every pod; a
//! sink that is down fails every chunk. Logging each one would drown the
//! useful lines, so this logs at most once per interval and reports how
//! many occurrences were folded into the line.
//!
//! # Example
//!
//! ```ignore
//! let logger = RateLimitedLogger::new(Duration::from_secs(10));
//!
//! // Only logs once per 10 seconds, even if called frequently
//! for _ in 0..1000 {
//!     logger.warn("metadata fetch failed", &fetch_error);
//! }
//! ```

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default interval between emitted lines
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Logs at most once per interval, counting what it suppressed
pub struct RateLimitedLogger {
    min_interval: Duration,
    last_log_time: Mutex<Option<Instant>>,
    /// Occurrences since the last emitted line
    pending: AtomicU64,
    total: AtomicU64,
}

impl RateLimitedLogger {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_log_time: Mutex::new(None),
            pending: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }

    /// Record a warning and log it if the interval has passed
    ///
    /// Returns true if the warning was logged, false if it was suppressed.
    pub fn warn(&self, message: &str, error: &dyn Display) -> bool {
        let Some((suppressed, total)) = self.record() else {
            return false;
        };

        if suppressed > 0 {
            tracing::warn!(
                error = %error,
                suppressed_count = suppressed,
                total_count = total,
                "{} (rate-limited)",
                message
            );
        } else {
            tracing::warn!(error = %error, total_count = total, "{}", message);
        }
        true
    }

    /// Count one occurrence; `Some((suppressed, total))` when it should be logged
    fn record(&self) -> Option<(u64, u64)> {
        self.pending.fetch_add(1, Ordering::Relaxed);
        let total = self.total.fetch_add(1, Ordering::Relaxed) + 1;

        let should_log = {
            let mut last_time = self.last_log_time.lock();
            let now = Instant::now();

            match *last_time {
                Some(last) if now.duration_since(last) < self.min_interval => false,
                _ => {
                    *last_time = Some(now);
                    true
                }
            }
        };

        if should_log {
            let count = self.pending.swap(0, Ordering::Relaxed);
            Some((count.saturating_sub(1), total))
        } else {
            None
        }
    }

    /// Occurrences since the last emitted line
    pub fn pending_count(&self) -> u64 {
        self.pending.load(Ordering::Relaxed)
    }

    pub fn total_count(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl Default for RateLimitedLogger {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_INTERVAL)
    }
}

impl std::fmt::Debug for RateLimitedLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedLogger")
            .field("min_interval", &self.min_interval)
            .field("total", &self.total_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_warning_always_logs() {
        let logger = RateLimitedLogger::new(Duration::from_secs(10));
        assert!(logger.warn("fetch failed", &"connection refused"));
        assert_eq!(logger.total_count(), 1);
        assert_eq!(logger.pending_count(), 0);
    }

    #[test]
    fn test_rapid_warnings_suppressed() {
        let logger = RateLimitedLogger::new(Duration::from_secs(10));
        assert!(logger.warn("fetch failed", &"refused"));

        for _ in 0..10 {
            assert!(!logger.warn("fetch failed", &"refused"));
        }

        assert_eq!(logger.total_count(), 11);
        assert_eq!(logger.pending_count(), 10);
    }

    #[test]
    fn test_zero_interval_never_suppresses() {
        let logger = RateLimitedLogger::new(Duration::ZERO);
        for _ in 0..5 {
            assert!(logger.warn("fetch failed", &"refused"));
        }
        assert_eq!(logger.pending_count(), 0);
    }

    #[test]
    fn test_default_interval() {
        let logger = RateLimitedLogger::default();
        assert_eq!(logger.min_interval, DEFAULT_LOG_INTERVAL);
    }
}
