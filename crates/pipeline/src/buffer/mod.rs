//! Chunk Buffer - Per-destination chunking with retry and overflow
//!
//! Records are appended to the open chunk of their destination. A chunk is
//! sealed when it reaches `chunk_max_records` or `chunk_max_bytes`, when
//! it is older than `chunk_max_age` (`seal_aged`), or on shutdown
//! (`seal_all`). `drain` hands sealed chunks to the engine.
//!
//! # Ordering
//!
//! At most one chunk per destination is in flight. `drain` always picks
//! the oldest waiting chunk of a destination, and a failed chunk waiting
//! out its backoff blocks the chunks behind it, so each destination sees
//! chunks in creation order.
//!
//! # Memory
//!
//! Bytes held by in-memory chunks are tracked against `memory_limit`.
//! Past the limit, new chunks open in `overflow_dir` when one is
//! configured; otherwise `is_over_limit()` reports true and the engine
//! stops reading input until deliveries free memory.

mod backoff;
mod chunk;
mod overflow;
mod stored;

pub use backoff::RetryPolicy;
pub use chunk::{Chunk, ChunkId, ChunkState};
pub use overflow::OverflowFile;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, warn};
use tributary_config::BufferConfig;
use tributary_protocol::Entry;
use tributary_routing::OutputId;

use crate::error::{PipelineError, Result};
use crate::metrics::EngineMetrics;

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

/// Result of a failed delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// The chunk goes back to the queue after `delay`
    Retry { failures: u32, delay: Duration },
    /// Attempts exhausted; the chunk is gone
    Dropped { failures: u32, records: usize },
}

enum Storage {
    /// Open in memory
    Memory(Vec<Entry>),
    /// Sealed in memory, shared with in-flight chunks
    Sealed(Arc<[Entry]>),
    /// Spilled to overflow storage
    Disk(OverflowFile),
}

impl Storage {
    fn is_memory(&self) -> bool {
        !matches!(self, Self::Disk(_))
    }
}

struct Slot {
    output: OutputId,
    state: ChunkState,
    storage: Storage,
    created_at: Instant,
    records: usize,
    bytes: usize,
    failures: u32,
    retry_at: Option<Instant>,
}

/// Chunk buffer owned by the engine's control loop
pub struct ChunkBuffer {
    config: BufferConfig,
    retry: RetryPolicy,
    metrics: Arc<EngineMetrics>,
    slots: BTreeMap<ChunkId, Slot>,
    open: HashMap<OutputId, ChunkId>,
    in_flight: HashSet<OutputId>,
    next_id: u64,
    memory_bytes: usize,
}

impl ChunkBuffer {
    /// Create a buffer, creating `overflow_dir` if configured
    ///
    /// # Errors
    /// Returns `PipelineError::Overflow` if the overflow directory cannot
    /// be created.
    pub fn new(
        config: BufferConfig,
        retry: RetryPolicy,
        metrics: Arc<EngineMetrics>,
    ) -> Result<Self> {
        if let Some(dir) = &config.overflow_dir {
            std::fs::create_dir_all(dir).map_err(|e| PipelineError::overflow(dir, e))?;
        }

        Ok(Self {
            config,
            retry,
            metrics,
            slots: BTreeMap::new(),
            open: HashMap::new(),
            in_flight: HashSet::new(),
            next_id: 0,
            memory_bytes: 0,
        })
    }

    /// Append an entry to the open chunk of `output`
    ///
    /// # Errors
    /// Returns an overflow error if the entry could not be written to
    /// disk; the entry is lost in that case.
    pub fn append(&mut self, output: OutputId, entry: Entry, now: Instant) -> Result<()> {
        let id = match self.open.get(&output) {
            Some(&id) => id,
            None => self.open_chunk(output, now),
        };
        let size = entry.estimated_size();

        let Some(slot) = self.slots.get_mut(&id) else {
            return Ok(());
        };

        match &mut slot.storage {
            Storage::Memory(entries) => {
                entries.push(entry);
                self.memory_bytes += size;
            }
            Storage::Disk(file) => file.append(&entry)?,
            Storage::Sealed(_) => return Ok(()),
        }

        slot.records += 1;
        slot.bytes += size;
        self.metrics.record_buffered();

        if slot.records >= self.config.chunk_max_records
            || slot.bytes >= self.config.chunk_max_bytes
        {
            self.seal(id);
        }

        Ok(())
    }

    fn open_chunk(&mut self, output: OutputId, now: Instant) -> ChunkId {
        self.next_id += 1;
        let id = ChunkId::new(self.next_id);

        let storage = match &self.config.overflow_dir {
            Some(dir) if self.memory_bytes >= self.config.memory_limit => {
                match OverflowFile::create(dir, id) {
                    Ok(file) => {
                        self.metrics.record_spilled();
                        debug!(
                            chunk = %id,
                            path = %file.path().display(),
                            "chunk opened in overflow storage"
                        );
                        Storage::Disk(file)
                    }
                    Err(e) => {
                        warn!(
                            chunk = %id,
                            error = %e,
                            "overflow storage unavailable, keeping chunk in memory"
                        );
                        Storage::Memory(Vec::new())
                    }
                }
            }
            _ => Storage::Memory(Vec::new()),
        };

        self.slots.insert(
            id,
            Slot {
                output,
                state: ChunkState::Open,
                storage,
                created_at: now,
                records: 0,
                bytes: 0,
                failures: 0,
                retry_at: None,
            },
        );
        self.open.insert(output, id);
        id
    }

    fn seal(&mut self, id: ChunkId) {
        let Some(slot) = self.slots.get_mut(&id) else {
            return;
        };
        if slot.state != ChunkState::Open {
            return;
        }

        self.open.remove(&slot.output);
        slot.state = ChunkState::Sealed;
        slot.storage = match std::mem::replace(&mut slot.storage, Storage::Sealed(Arc::from([]))) {
            Storage::Memory(entries) => Storage::Sealed(entries.into()),
            Storage::Disk(mut file) => {
                if let Err(e) = file.seal() {
                    error!(chunk = %id, error = %e, "failed to flush overflow chunk");
                }
                Storage::Disk(file)
            }
            sealed @ Storage::Sealed(_) => sealed,
        };
        self.metrics.record_sealed();
    }

    /// Seal open chunks older than `chunk_max_age`
    pub fn seal_aged(&mut self, now: Instant) -> usize {
        let max_age = self.config.chunk_max_age;
        let aged: Vec<ChunkId> = self
            .open
            .values()
            .copied()
            .filter(|id| {
                self.slots
                    .get(id)
                    .is_some_and(|slot| now.saturating_duration_since(slot.created_at) >= max_age)
            })
            .collect();

        for id in &aged {
            self.seal(*id);
        }
        aged.len()
    }

    /// Seal every open chunk
    pub fn seal_all(&mut self) -> usize {
        let open: Vec<ChunkId> = self.open.values().copied().collect();
        for id in &open {
            self.seal(*id);
        }
        open.len()
    }

    /// Take the chunks that are due for delivery
    ///
    /// Returns at most one chunk per destination, and none for a
    /// destination that already has a chunk in flight.
    pub fn drain(&mut self, now: Instant) -> Vec<Arc<Chunk>> {
        let mut blocked: HashSet<OutputId> = self.in_flight.clone();
        let mut ready = Vec::new();
        let mut unreadable = Vec::new();

        for (&id, slot) in self.slots.iter_mut() {
            if blocked.contains(&slot.output) {
                continue;
            }

            match slot.state {
                ChunkState::Open | ChunkState::InFlight => continue,
                ChunkState::Failed if slot.retry_at.is_some_and(|at| at > now) => {
                    blocked.insert(slot.output);
                    continue;
                }
                ChunkState::Sealed | ChunkState::Failed => {}
            }
            blocked.insert(slot.output);

            let entries: Arc<[Entry]> = match &slot.storage {
                Storage::Sealed(entries) => Arc::clone(entries),
                Storage::Memory(entries) => entries.clone().into(),
                Storage::Disk(file) => match file.read_entries() {
                    Ok(entries) => entries.into(),
                    Err(e) => {
                        error!(
                            chunk = %id,
                            error = %e,
                            records = slot.records,
                            data_loss = true,
                            "overflow chunk unreadable, dropping"
                        );
                        unreadable.push(id);
                        continue;
                    }
                },
            };

            slot.state = ChunkState::InFlight;
            slot.retry_at = None;
            self.in_flight.insert(slot.output);
            ready.push(Arc::new(Chunk::new(id, slot.output, slot.failures + 1, entries)));
        }

        for id in unreadable {
            if let Some(slot) = self.remove(id) {
                self.metrics.record_dropped(slot.records as u64);
            }
        }

        ready
    }

    /// Acknowledge a delivered chunk, freeing it
    ///
    /// Returns the number of records delivered, or None for an unknown id.
    pub fn ack(&mut self, id: ChunkId) -> Option<usize> {
        let slot = self.remove(id)?;
        self.metrics.record_delivered(slot.records as u64);
        Some(slot.records)
    }

    /// Record a failed delivery
    ///
    /// The chunk is rescheduled with backoff, or dropped once it has used
    /// `max_attempts`.
    pub fn fail(&mut self, id: ChunkId, now: Instant) -> Option<FailOutcome> {
        let slot = self.slots.get_mut(&id)?;
        slot.failures += 1;
        let failures = slot.failures;
        self.in_flight.remove(&slot.output);

        if self.retry.should_retry(failures) {
            let delay = self.retry.delay_for_attempt(failures);
            slot.state = ChunkState::Failed;
            slot.retry_at = Some(now + delay);
            self.metrics.record_retry();
            return Some(FailOutcome::Retry { failures, delay });
        }

        let slot = self.remove(id)?;
        self.metrics.record_dropped(slot.records as u64);
        Some(FailOutcome::Dropped {
            failures,
            records: slot.records,
        })
    }

    /// Drop every chunk, in flight or not
    ///
    /// Used when the shutdown grace period runs out. Returns the number of
    /// records dropped.
    pub fn drop_all(&mut self) -> usize {
        let ids: Vec<ChunkId> = self.slots.keys().copied().collect();
        let mut records = 0;
        for id in ids {
            if let Some(slot) = self.remove(id) {
                self.metrics.record_dropped(slot.records as u64);
                records += slot.records;
            }
        }
        records
    }

    fn remove(&mut self, id: ChunkId) -> Option<Slot> {
        let mut slot = self.slots.remove(&id)?;

        if self.open.get(&slot.output) == Some(&id) {
            self.open.remove(&slot.output);
        }
        if slot.state == ChunkState::InFlight {
            self.in_flight.remove(&slot.output);
        }
        if slot.storage.is_memory() {
            self.memory_bytes = self.memory_bytes.saturating_sub(slot.bytes);
        }

        let storage = std::mem::replace(&mut slot.storage, Storage::Memory(Vec::new()));
        if let Storage::Disk(file) = storage
            && let Err(e) = file.remove()
        {
            warn!(chunk = %id, error = %e, "failed to remove overflow file");
        }

        Some(slot)
    }

    pub fn state(&self, id: ChunkId) -> Option<ChunkState> {
        self.slots.get(&id).map(|slot| slot.state)
    }

    /// Whether input should pause until deliveries free memory
    pub fn is_over_limit(&self) -> bool {
        self.config.overflow_dir.is_none() && self.memory_bytes >= self.config.memory_limit
    }

    /// Bytes held by in-memory chunks
    pub fn memory_bytes(&self) -> usize {
        self.memory_bytes
    }

    /// Earliest time a failed chunk becomes due
    pub fn next_retry_at(&self) -> Option<Instant> {
        self.slots
            .values()
            .filter(|slot| slot.state == ChunkState::Failed)
            .filter_map(|slot| slot.retry_at)
            .min()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Records held in every chunk
    pub fn pending_records(&self) -> usize {
        self.slots.values().map(|slot| slot.records).sum()
    }

    /// Number of chunks held
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl std::fmt::Debug for ChunkBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkBuffer")
            .field("chunks", &self.slots.len())
            .field("open", &self.open.len())
            .field("in_flight", &self.in_flight.len())
            .field("memory_bytes", &self.memory_bytes)
            .finish()
    }
}
