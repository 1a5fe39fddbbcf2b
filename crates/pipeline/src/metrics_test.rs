//! Tests for engine metrics

use super::*;
use std::sync::Arc;

#[test]
fn test_new_is_zeroed() {
    let metrics = EngineMetrics::new();
    assert_eq!(metrics.snapshot(), EngineMetricsSnapshot::default());
}

#[test]
fn test_counters() {
    let metrics = EngineMetrics::new();

    metrics.record_received(10);
    metrics.record_unrouted();
    metrics.record_filtered_out(2);
    for _ in 0..7 {
        metrics.record_buffered();
    }
    metrics.record_sealed();
    metrics.record_sealed();
    metrics.record_spilled();
    metrics.record_delivered(5);
    metrics.record_retry();
    metrics.record_dropped(2);
    metrics.record_backpressure();

    let s = metrics.snapshot();
    assert_eq!(s.records_received, 10);
    assert_eq!(s.records_unrouted, 1);
    assert_eq!(s.records_filtered_out, 2);
    assert_eq!(s.records_buffered, 7);
    assert_eq!(s.chunks_sealed, 2);
    assert_eq!(s.chunks_spilled, 1);
    assert_eq!(s.chunks_delivered, 1);
    assert_eq!(s.records_delivered, 5);
    assert_eq!(s.chunk_retries, 1);
    assert_eq!(s.chunks_dropped, 1);
    assert_eq!(s.records_dropped, 2);
    assert_eq!(s.backpressure_events, 1);
}

#[test]
fn test_delivery_success_rate() {
    let mut s = EngineMetricsSnapshot::default();
    assert_eq!(s.delivery_success_rate(), None);
    assert!(!s.has_data_loss());

    s.chunks_delivered = 3;
    s.chunks_dropped = 1;
    s.records_dropped = 4;
    assert_eq!(s.delivery_success_rate(), Some(0.75));
    assert!(s.has_data_loss());
}

#[test]
fn test_concurrent_updates() {
    let metrics = Arc::new(EngineMetrics::new());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let m = Arc::clone(&metrics);
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    m.record_received(1);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(metrics.snapshot().records_received, 4000);
}
