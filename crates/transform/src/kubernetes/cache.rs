//! Metadata Cache - Single-flight TTL cache for pod metadata
//!
//! Every entry is in one of three states:
//!
//! ```text
//!            lookup (miss)              complete(Ok)
//!  Absent ─────────────────▶ Fetching ─────────────────▶ Valid(expiry)
//!    ▲                          │                            │
//!    │   complete(Err) / ticket │                            │ now >= expiry
//!    └──────── dropped ◀────────┘                            ▼
//!    └────────────────── next lookup is a miss ◀──────── (expired)
//! ```
//!
//! # Design
//!
//! - **Single flight**: the lookup that observes a miss moves the entry to
//!   `Fetching` under the same lock and receives the only `FetchTicket`;
//!   concurrent lookups get a `Waiter` on that fetch
//! - **Short critical sections**: the lock guards state transitions only
//!   and is never held across an await
//! - **RAII tickets**: a ticket dropped without `complete` reverts its
//!   entry to `Absent` and wakes the waiters
//! - **Eviction never touches `Fetching` entries**

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::document::MetadataDocument;
use super::key::MetadataKey;
use crate::FetchError;

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;

/// Cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Lookups answered with a valid document
    pub hits: AtomicU64,

    /// Lookups that started a fetch
    pub misses: AtomicU64,

    /// Lookups that joined a fetch already in flight
    pub pending: AtomicU64,

    /// Fetches completed with a document
    pub fetch_successes: AtomicU64,

    /// Fetches completed with an error
    pub fetch_failures: AtomicU64,

    /// Tickets dropped without being completed
    pub fetch_abandoned: AtomicU64,

    /// Entries removed to stay under `max_entries`
    pub evictions: AtomicU64,
}

impl CacheStats {
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            pending: self.pending.load(Ordering::Relaxed),
            fetch_successes: self.fetch_successes.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            fetch_abandoned: self.fetch_abandoned.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of `CacheStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub pending: u64,
    pub fetch_successes: u64,
    pub fetch_failures: u64,
    pub fetch_abandoned: u64,
    pub evictions: u64,
}

/// Outcome of a fetch as seen by waiters
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The fetch produced a document
    Ready(Arc<MetadataDocument>),
    /// The fetch failed or was abandoned
    Absent,
}

/// Result of `MetadataCache::lookup`
#[derive(Debug)]
pub enum CacheResult {
    /// A valid document
    Hit(Arc<MetadataDocument>),
    /// Nothing usable; the caller owns the fetch
    Miss(FetchTicket),
    /// Another caller is fetching
    Pending(Waiter),
}

/// Observable state of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Absent,
    Fetching,
    Valid,
    Expired,
}

/// Diagnostic view of an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub state: EntryState,
    /// Fetches started for this key
    pub fetch_attempts: u32,
    /// Error of the most recent failed fetch, cleared on success
    pub last_error: Option<String>,
}

enum SlotState {
    Absent,
    Fetching {
        ticket: u64,
        notify: watch::Sender<Option<Resolution>>,
    },
    Valid {
        doc: Arc<MetadataDocument>,
        expires_at: Instant,
    },
}

struct Slot {
    state: SlotState,
    fetch_attempts: u32,
    last_error: Option<String>,
    /// Insertion sequence, used to pick the oldest valid entry to evict
    inserted: u64,
}

impl Slot {
    fn is_reclaimable(&self, now: Instant) -> bool {
        match &self.state {
            SlotState::Absent => true,
            SlotState::Fetching { .. } => false,
            SlotState::Valid { expires_at, .. } => *expires_at <= now,
        }
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<MetadataKey, Slot>,
    sequence: u64,
}

impl CacheState {
    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    /// Remove absent and expired entries, returning how many went
    fn purge(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, slot| !slot.is_reclaimable(now));
        before - self.entries.len()
    }

    /// Make space for one more entry
    ///
    /// Reclaimable entries go first, then the oldest valid one. Entries
    /// that are being fetched are never removed, so the map may exceed
    /// `max_entries` while every slot is in flight.
    fn make_room(&mut self, max_entries: usize, now: Instant) -> u64 {
        if max_entries == 0 || self.entries.len() < max_entries {
            return 0;
        }

        let mut evicted = self.purge(now) as u64;

        while self.entries.len() >= max_entries {
            let oldest = self
                .entries
                .iter()
                .filter(|(_, slot)| matches!(slot.state, SlotState::Valid { .. }))
                .min_by_key(|(_, slot)| slot.inserted)
                .map(|(key, _)| key.clone());

            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                    evicted += 1;
                }
                None => break,
            }
        }

        evicted
    }
}

struct CacheInner {
    ttl: Duration,
    max_entries: usize,
    state: Mutex<CacheState>,
    stats: CacheStats,
}

impl CacheInner {
    /// Move a `Fetching` slot owned by `ticket` to its final state
    fn resolve(
        &self,
        key: &MetadataKey,
        ticket: u64,
        outcome: Result<MetadataDocument, FetchError>,
    ) -> Resolution {
        let now = Instant::now();
        let mut state = self.state.lock();
        let sequence = state.next_sequence();

        let Some(slot) = state.entries.get_mut(key) else {
            return outcome.map_or(Resolution::Absent, |doc| Resolution::Ready(Arc::new(doc)));
        };
        if !matches!(&slot.state, SlotState::Fetching { ticket: t, .. } if *t == ticket) {
            return outcome.map_or(Resolution::Absent, |doc| Resolution::Ready(Arc::new(doc)));
        }

        let resolution = match outcome {
            Ok(doc) => {
                let doc = Arc::new(doc);
                slot.last_error = None;
                slot.inserted = sequence;
                self.stats.fetch_successes.fetch_add(1, Ordering::Relaxed);
                Resolution::Ready(doc)
            }
            Err(e) => {
                slot.last_error = Some(e.to_string());
                self.stats.fetch_failures.fetch_add(1, Ordering::Relaxed);
                Resolution::Absent
            }
        };

        let next = match &resolution {
            Resolution::Ready(doc) => SlotState::Valid {
                doc: Arc::clone(doc),
                expires_at: now + self.ttl,
            },
            Resolution::Absent => SlotState::Absent,
        };

        if let SlotState::Fetching { notify, .. } = std::mem::replace(&mut slot.state, next) {
            drop(state);
            notify.send_replace(Some(resolution.clone()));
        }

        resolution
    }

    fn abandon(&self, key: &MetadataKey, ticket: u64) {
        let mut state = self.state.lock();
        let Some(slot) = state.entries.get_mut(key) else {
            return;
        };
        if !matches!(&slot.state, SlotState::Fetching { ticket: t, .. } if *t == ticket) {
            return;
        }

        self.stats.fetch_abandoned.fetch_add(1, Ordering::Relaxed);
        if let SlotState::Fetching { notify, .. } =
            std::mem::replace(&mut slot.state, SlotState::Absent)
        {
            drop(state);
            debug!(key = %key, "metadata fetch abandoned");
            notify.send_replace(Some(Resolution::Absent));
        }
    }
}

/// Exclusive right to fetch one key
///
/// Resolve it with `MetadataCache::complete`. Dropping it unresolved puts
/// the entry back to `Absent` so the next lookup retries.
pub struct FetchTicket {
    key: MetadataKey,
    ticket: u64,
    inner: Arc<CacheInner>,
    armed: bool,
}

impl FetchTicket {
    pub fn key(&self) -> &MetadataKey {
        &self.key
    }
}

impl Drop for FetchTicket {
    fn drop(&mut self) {
        if self.armed {
            self.inner.abandon(&self.key, self.ticket);
        }
    }
}

impl std::fmt::Debug for FetchTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchTicket")
            .field("key", &self.key)
            .field("ticket", &self.ticket)
            .finish()
    }
}

/// Handle on a fetch started by someone else
#[derive(Debug)]
pub struct Waiter {
    rx: watch::Receiver<Option<Resolution>>,
}

impl Waiter {
    /// Wait for the fetch to resolve
    ///
    /// Every waiter on one fetch observes the same resolution.
    pub async fn wait(mut self) -> Resolution {
        match self.rx.wait_for(Option::is_some).await {
            Ok(resolution) => (*resolution).clone().unwrap_or(Resolution::Absent),
            Err(_) => Resolution::Absent,
        }
    }
}

/// Shared metadata cache
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MetadataCache {
    inner: Arc<CacheInner>,
}

impl MetadataCache {
    /// Create a cache
    ///
    /// `max_entries = 0` means unbounded.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                ttl,
                max_entries,
                state: Mutex::new(CacheState::default()),
                stats: CacheStats::default(),
            }),
        }
    }

    /// Look up a key, claiming the fetch if nothing usable is cached
    pub fn lookup(&self, key: &MetadataKey) -> CacheResult {
        let now = Instant::now();
        let mut state = self.inner.state.lock();

        if let Some(slot) = state.entries.get(key) {
            match &slot.state {
                SlotState::Valid { doc, expires_at } if *expires_at > now => {
                    self.inner.stats.hits.fetch_add(1, Ordering::Relaxed);
                    return CacheResult::Hit(Arc::clone(doc));
                }
                SlotState::Fetching { notify, .. } => {
                    self.inner.stats.pending.fetch_add(1, Ordering::Relaxed);
                    return CacheResult::Pending(Waiter {
                        rx: notify.subscribe(),
                    });
                }
                _ => {}
            }
        }

        if !state.entries.contains_key(key) {
            let evicted = state.make_room(self.inner.max_entries, now);
            if evicted > 0 {
                self.inner.stats.evictions.fetch_add(evicted, Ordering::Relaxed);
                trace!(evicted, "metadata cache evicted entries");
            }
        }

        let ticket = state.next_sequence();
        let (notify, _) = watch::channel(None);
        let slot = state.entries.entry(key.clone()).or_insert_with(|| Slot {
            state: SlotState::Absent,
            fetch_attempts: 0,
            last_error: None,
            inserted: ticket,
        });
        slot.state = SlotState::Fetching { ticket, notify };
        slot.fetch_attempts += 1;
        drop(state);

        self.inner.stats.misses.fetch_add(1, Ordering::Relaxed);
        trace!(key = %key, "metadata cache miss");

        CacheResult::Miss(FetchTicket {
            key: key.clone(),
            ticket,
            inner: Arc::clone(&self.inner),
            armed: true,
        })
    }

    /// Resolve a fetch
    ///
    /// Success stores the document until `now + ttl`; failure records the
    /// error and reverts the entry to `Absent`. Waiters are woken with the
    /// returned resolution either way.
    pub fn complete(
        &self,
        mut ticket: FetchTicket,
        outcome: Result<MetadataDocument, FetchError>,
    ) -> Resolution {
        ticket.armed = false;
        ticket.inner.resolve(&ticket.key, ticket.ticket, outcome)
    }

    /// Remove absent and expired entries
    ///
    /// Entries being fetched are kept.
    pub fn sweep(&self) -> usize {
        self.inner.state.lock().purge(Instant::now())
    }

    /// Run `sweep` every `interval` until `cancel` fires
    pub fn spawn_sweeper(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let cache = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = cache.sweep();
                        if removed > 0 {
                            debug!(removed, remaining = cache.len(), "metadata cache swept");
                        }
                    }
                    _ = cancel.cancelled() => {
                        info!("metadata cache sweeper stopped");
                        break;
                    }
                }
            }
        })
    }

    /// Inspect an entry
    pub fn entry_info(&self, key: &MetadataKey) -> Option<EntryInfo> {
        let now = Instant::now();
        let state = self.inner.state.lock();
        let slot = state.entries.get(key)?;

        let entry_state = match &slot.state {
            SlotState::Absent => EntryState::Absent,
            SlotState::Fetching { .. } => EntryState::Fetching,
            SlotState::Valid { expires_at, .. } if *expires_at > now => EntryState::Valid,
            SlotState::Valid { .. } => EntryState::Expired,
        };

        Some(EntryInfo {
            state: entry_state,
            fetch_attempts: slot.fetch_attempts,
            last_error: slot.last_error.clone(),
        })
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> &CacheStats {
        &self.inner.stats
    }
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCache")
            .field("ttl", &self.inner.ttl)
            .field("max_entries", &self.inner.max_entries)
            .field("len", &self.len())
            .finish()
    }
}
