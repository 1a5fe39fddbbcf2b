//! Engine metrics
//!
//! Atomic counters shared by the control loop, the chunk buffer and
//! anyone holding an `EngineHandle`. All operations use relaxed ordering;
//! values are eventually consistent.

use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(test)]
#[path = "metrics_test.rs"]
mod tests;

/// Counters for one engine
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Records read from inputs
    records_received: AtomicU64,

    /// Records whose tag matched no rule
    records_unrouted: AtomicU64,

    /// Records removed by filter chains
    records_filtered_out: AtomicU64,

    /// Record copies appended to the buffer (one per destination)
    records_buffered: AtomicU64,

    /// Chunks sealed for delivery
    chunks_sealed: AtomicU64,

    /// Chunks opened in overflow storage instead of memory
    chunks_spilled: AtomicU64,

    /// Chunks acknowledged by their output
    chunks_delivered: AtomicU64,

    /// Records inside delivered chunks
    records_delivered: AtomicU64,

    /// Failed deliveries scheduled for another attempt
    chunk_retries: AtomicU64,

    /// Chunks given up on (attempts exhausted or shutdown)
    chunks_dropped: AtomicU64,

    /// Records inside dropped chunks
    records_dropped: AtomicU64,

    /// Times input was paused because the buffer hit its memory limit
    backpressure_events: AtomicU64,
}

impl EngineMetrics {
    #[inline]
    pub const fn new() -> Self {
        Self {
            records_received: AtomicU64::new(0),
            records_unrouted: AtomicU64::new(0),
            records_filtered_out: AtomicU64::new(0),
            records_buffered: AtomicU64::new(0),
            chunks_sealed: AtomicU64::new(0),
            chunks_spilled: AtomicU64::new(0),
            chunks_delivered: AtomicU64::new(0),
            records_delivered: AtomicU64::new(0),
            chunk_retries: AtomicU64::new(0),
            chunks_dropped: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
            backpressure_events: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_received(&self, count: u64) {
        self.records_received.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_unrouted(&self) {
        self.records_unrouted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_filtered_out(&self, count: u64) {
        self.records_filtered_out.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_buffered(&self) {
        self.records_buffered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_sealed(&self) {
        self.chunks_sealed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_spilled(&self) {
        self.chunks_spilled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_delivered(&self, records: u64) {
        self.chunks_delivered.fetch_add(1, Ordering::Relaxed);
        self.records_delivered.fetch_add(records, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_retry(&self) {
        self.chunk_retries.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self, records: u64) {
        self.chunks_dropped.fetch_add(1, Ordering::Relaxed);
        self.records_dropped.fetch_add(records, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_backpressure(&self) {
        self.backpressure_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> EngineMetricsSnapshot {
        EngineMetricsSnapshot {
            records_received: self.records_received.load(Ordering::Relaxed),
            records_unrouted: self.records_unrouted.load(Ordering::Relaxed),
            records_filtered_out: self.records_filtered_out.load(Ordering::Relaxed),
            records_buffered: self.records_buffered.load(Ordering::Relaxed),
            chunks_sealed: self.chunks_sealed.load(Ordering::Relaxed),
            chunks_spilled: self.chunks_spilled.load(Ordering::Relaxed),
            chunks_delivered: self.chunks_delivered.load(Ordering::Relaxed),
            records_delivered: self.records_delivered.load(Ordering::Relaxed),
            chunk_retries: self.chunk_retries.load(Ordering::Relaxed),
            chunks_dropped: self.chunks_dropped.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            backpressure_events: self.backpressure_events.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of engine metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineMetricsSnapshot {
    pub records_received: u64,
    pub records_unrouted: u64,
    pub records_filtered_out: u64,
    pub records_buffered: u64,
    pub chunks_sealed: u64,
    pub chunks_spilled: u64,
    pub chunks_delivered: u64,
    pub records_delivered: u64,
    pub chunk_retries: u64,
    pub chunks_dropped: u64,
    pub records_dropped: u64,
    pub backpressure_events: u64,
}

impl EngineMetricsSnapshot {
    /// Fraction of finished chunks that were delivered (0.0 - 1.0)
    ///
    /// Returns None if no chunk has finished yet.
    pub fn delivery_success_rate(&self) -> Option<f64> {
        let finished = self.chunks_delivered + self.chunks_dropped;
        if finished == 0 {
            None
        } else {
            Some(self.chunks_delivered as f64 / finished as f64)
        }
    }

    /// Whether any record was lost
    pub fn has_data_loss(&self) -> bool {
        self.records_dropped > 0
    }
}
