//! Tests for fetch dispatching

use super::*;
use crate::kubernetes::cache::{CacheResult, EntryState, Resolution};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Scripted fetcher: pops one outcome per call, then repeats the last one
struct ScriptedFetcher {
    outcomes: Mutex<Vec<Result<MetadataDocument, FetchError>>>,
    delay: Duration,
    calls: AtomicU32,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl ScriptedFetcher {
    fn new(mut outcomes: Vec<Result<MetadataDocument, FetchError>>) -> Self {
        outcomes.reverse();
        Self {
            outcomes: Mutex::new(outcomes),
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn next_outcome(&self) -> Result<MetadataDocument, FetchError> {
        let mut outcomes = self.outcomes.lock();
        if outcomes.len() > 1 {
            outcomes.pop().unwrap()
        } else {
            outcomes.last().cloned().unwrap()
        }
    }
}

impl MetadataFetcher for ScriptedFetcher {
    fn fetch<'a>(&'a self, _key: &'a MetadataKey) -> FetchFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(running, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            self.running.fetch_sub(1, Ordering::SeqCst);
            self.next_outcome()
        })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn doc() -> MetadataDocument {
    MetadataDocument::new()
        .with_namespace("default")
        .with_label("app", "alpha")
}

fn key(name: &str) -> MetadataKey {
    MetadataKey::new("default", name)
}

fn ticket(cache: &MetadataCache, key: &MetadataKey) -> FetchTicket {
    match cache.lookup(key) {
        CacheResult::Miss(ticket) => ticket,
        other => panic!("expected Miss, got {:?}", other),
    }
}

fn dispatcher(
    fetcher: Arc<ScriptedFetcher>,
    cache: &MetadataCache,
    config: DispatchConfig,
) -> FetchDispatcher {
    FetchDispatcher::new(fetcher, cache.clone(), config, CancellationToken::new())
}

// =============================================================================
// Backoff
// =============================================================================

#[test]
fn test_delay_for_attempt() {
    let config = DispatchConfig {
        backoff: Duration::from_millis(100),
        ..Default::default()
    };
    assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
    assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
    assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
    assert_eq!(config.delay_for_attempt(20), MAX_FETCH_BACKOFF);
}

// =============================================================================
// Dispatch
// =============================================================================

#[tokio::test]
async fn test_dispatch_completes_ticket() {
    let cache = MetadataCache::new(Duration::from_secs(60), 0);
    let fetcher = Arc::new(ScriptedFetcher::new(vec![Ok(doc())]));
    let dispatcher = dispatcher(fetcher.clone(), &cache, DispatchConfig::default());

    dispatcher.dispatch(ticket(&cache, &key("alpha"))).await.unwrap();

    assert!(matches!(cache.lookup(&key("alpha")), CacheResult::Hit(_)));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.fetcher_name(), "scripted");
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_retries_transient_failures() {
    let cache = MetadataCache::new(Duration::from_secs(60), 0);
    let fetcher = Arc::new(ScriptedFetcher::new(vec![
        Err(FetchError::Request("connection refused".into())),
        Err(FetchError::Status { status: 503 }),
        Ok(doc()),
    ]));
    let dispatcher = dispatcher(fetcher.clone(), &cache, DispatchConfig::default());

    dispatcher.dispatch(ticket(&cache, &key("alpha"))).await.unwrap();

    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    assert_eq!(cache.entry_info(&key("alpha")).unwrap().state, EntryState::Valid);
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_gives_up_after_attempts() {
    let cache = MetadataCache::new(Duration::from_secs(60), 0);
    let fetcher = Arc::new(ScriptedFetcher::new(vec![Err(FetchError::Request(
        "connection refused".into(),
    ))]));
    let config = DispatchConfig {
        attempts: 2,
        ..Default::default()
    };
    let dispatcher = dispatcher(fetcher.clone(), &cache, config);

    dispatcher.dispatch(ticket(&cache, &key("alpha"))).await.unwrap();

    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    let info = cache.entry_info(&key("alpha")).unwrap();
    assert_eq!(info.state, EntryState::Absent);
    assert!(info.last_error.unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let cache = MetadataCache::new(Duration::from_secs(60), 0);
    let fetcher = Arc::new(ScriptedFetcher::new(vec![Err(FetchError::Status { status: 404 })]));
    let dispatcher = dispatcher(fetcher.clone(), &cache, DispatchConfig::default());

    dispatcher.dispatch(ticket(&cache, &key("ghost"))).await.unwrap();

    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stats().snapshot().fetch_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_timeout() {
    let cache = MetadataCache::new(Duration::from_secs(60), 0);
    let fetcher =
        Arc::new(ScriptedFetcher::new(vec![Ok(doc())]).with_delay(Duration::from_secs(10)));
    let config = DispatchConfig {
        timeout: Duration::from_secs(1),
        attempts: 2,
        ..Default::default()
    };
    let dispatcher = dispatcher(fetcher.clone(), &cache, config);

    dispatcher.dispatch(ticket(&cache, &key("slow"))).await.unwrap();

    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    let info = cache.entry_info(&key("slow")).unwrap();
    assert!(info.last_error.unwrap().contains("timed out"));
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_is_bounded() {
    let cache = MetadataCache::new(Duration::from_secs(60), 0);
    let fetcher =
        Arc::new(ScriptedFetcher::new(vec![Ok(doc())]).with_delay(Duration::from_millis(50)));
    let config = DispatchConfig {
        max_concurrent: 2,
        ..Default::default()
    };
    let dispatcher = dispatcher(fetcher.clone(), &cache, config);

    let handles: Vec<_> = (0..8)
        .map(|i| dispatcher.dispatch(ticket(&cache, &key(&format!("pod-{}", i)))))
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 8);
    assert_eq!(fetcher.max_running.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_reverts_in_flight_tickets() {
    let cache = MetadataCache::new(Duration::from_secs(60), 0);
    let fetcher =
        Arc::new(ScriptedFetcher::new(vec![Ok(doc())]).with_delay(Duration::from_secs(60)));
    let dispatcher = dispatcher(fetcher, &cache, DispatchConfig::default());

    let handle = dispatcher.dispatch(ticket(&cache, &key("alpha")));
    let waiter = match cache.lookup(&key("alpha")) {
        CacheResult::Pending(waiter) => waiter,
        other => panic!("expected Pending, got {:?}", other),
    };

    dispatcher.shutdown();
    handle.await.unwrap();

    assert_eq!(waiter.wait().await, Resolution::Absent);
    assert_eq!(cache.entry_info(&key("alpha")).unwrap().state, EntryState::Absent);
}

// =============================================================================
// HttpFetcher
// =============================================================================

#[test]
fn test_http_fetcher_url() {
    let fetcher = HttpFetcher::new("http://127.0.0.1:8001/", None, Duration::from_secs(1)).unwrap();
    assert_eq!(
        fetcher.url(&key("web-1")),
        "http://127.0.0.1:8001/api/v1/namespaces/default/pods/web-1"
    );
    assert_eq!(fetcher.name(), "http");
}

#[test]
fn test_http_fetcher_debug_redacts_token() {
    let fetcher = HttpFetcher::new(
        "http://127.0.0.1:8001",
        Some("s3cret".into()),
        Duration::from_secs(1),
    )
    .unwrap();
    let debug = format!("{:?}", fetcher);
    assert!(!debug.contains("s3cret"));
    assert!(debug.contains("<redacted>"));
}
