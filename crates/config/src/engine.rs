//! Engine, buffer and retry settings
//!
//! These three sections drive the scheduler: how often chunks are flushed,
//! how large they grow, how much memory they may hold and how failed
//! deliveries are retried.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Scheduler settings
///
/// # Example
///
/// ```toml
/// [engine]
/// flush_interval = "1s"
/// grace_period = "5s"
/// delivery_timeout = "30s"
/// max_concurrent_deliveries = 8
/// input_queue_size = 1024
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How often sealed chunks are handed to outputs
    /// Default: 1s
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,

    /// How long shutdown keeps flushing before dropping what remains
    /// Default: 5s
    #[serde(with = "humantime_serde")]
    pub grace_period: Duration,

    /// Upper bound for a single `deliver` call
    /// Default: 30s
    #[serde(with = "humantime_serde")]
    pub delivery_timeout: Duration,

    /// Deliveries allowed in flight at once across all outputs
    /// Default: 8
    pub max_concurrent_deliveries: usize,

    /// Capacity of the channel between inputs and the control loop (batches)
    /// Default: 1024
    pub input_queue_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(1),
            grace_period: Duration::from_secs(5),
            delivery_timeout: Duration::from_secs(30),
            max_concurrent_deliveries: 8,
            input_queue_size: 1024,
        }
    }
}

/// Chunk buffer settings
///
/// # Example
///
/// ```toml
/// [buffer]
/// chunk_max_records = 1000
/// chunk_max_bytes = 2097152
/// chunk_max_age = "1s"
/// memory_limit = 67108864
/// overflow_dir = "/var/lib/tributary/overflow"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Seal a chunk once it holds this many records
    /// Default: 1000
    pub chunk_max_records: usize,

    /// Seal a chunk once its estimated size reaches this many bytes
    /// Default: 2 MiB
    pub chunk_max_bytes: usize,

    /// Seal an open chunk once it is this old
    /// Default: 1s
    #[serde(with = "humantime_serde")]
    pub chunk_max_age: Duration,

    /// In-memory ceiling for buffered records (bytes)
    /// Default: 64 MiB
    pub memory_limit: usize,

    /// Directory for chunks opened past the memory ceiling
    /// Default: none (backpressure instead of spilling)
    pub overflow_dir: Option<PathBuf>,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            chunk_max_records: 1000,
            chunk_max_bytes: 2 * 1024 * 1024,
            chunk_max_age: Duration::from_secs(1),
            memory_limit: 64 * 1024 * 1024,
            overflow_dir: None,
        }
    }
}

/// Delivery retry settings
///
/// Backoff before attempt `n` is `initial_backoff * multiplier^(n-1)`,
/// capped at `max_backoff`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delivery attempts per chunk before it is dropped
    /// Default: 5
    pub max_attempts: u32,

    /// Delay before the first retry
    /// Default: 1s
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,

    /// Upper bound for any single delay
    /// Default: 60s
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,

    /// Growth factor between consecutive delays
    /// Default: 2.0
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}
