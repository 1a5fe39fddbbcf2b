//! Chunks: ordered runs of entries bound for one output

use std::fmt;
use std::sync::Arc;

use tributary_protocol::Entry;
use tributary_routing::OutputId;

/// Chunk identifier, increasing in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkId(u64);

impl ChunkId {
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk:{}", self.0)
    }
}

/// Lifecycle of a chunk inside the buffer
///
/// ```text
/// Open ──seal──▶ Sealed ──drain──▶ InFlight ──ack──▶ (removed)
///                  ▲                  │
///                  └──── Failed ◀─────┘ fail (attempts left)
/// ```
///
/// A failed chunk with no attempts left is removed and reported as
/// dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    /// Accepting entries
    Open,
    /// Closed, waiting to be handed to its output
    Sealed,
    /// Handed to its output, waiting for the result
    InFlight,
    /// Delivery failed, waiting out its backoff
    Failed,
}

/// A sealed chunk as handed to an output
///
/// Outputs get an `Arc<Chunk>` and must not keep it past `deliver`
/// returning; the buffer owns the chunk until it is acknowledged.
#[derive(Debug, Clone)]
pub struct Chunk {
    id: ChunkId,
    output: OutputId,
    attempt: u32,
    entries: Arc<[Entry]>,
}

impl Chunk {
    pub(crate) fn new(id: ChunkId, output: OutputId, attempt: u32, entries: Arc<[Entry]>) -> Self {
        Self {
            id,
            output,
            attempt,
            entries,
        }
    }

    #[inline]
    pub fn id(&self) -> ChunkId {
        self.id
    }

    /// Destination fixed when the chunk was opened
    #[inline]
    pub fn output(&self) -> OutputId {
        self.output
    }

    /// Delivery attempt this hand-off represents (1-based)
    #[inline]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Entries in append order
    #[inline]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
