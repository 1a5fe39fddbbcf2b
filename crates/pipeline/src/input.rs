//! Inputs - Where batches enter the engine
//!
//! Each input runs on its own task and pushes batches into the engine's
//! bounded input channel, so a full channel slows the input down instead
//! of growing memory.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::sync::mpsc;
use tracing::warn;
use tributary_protocol::{Batch, Entry, Fields, Record, Tag, decode_fields};

/// Source of tagged records
#[async_trait]
pub trait Input: Send {
    /// Name for logging
    fn name(&self) -> &str;

    /// Next batch of records, or `None` when the input is exhausted
    async fn next_batch(&mut self) -> Option<Batch>;
}

/// Input replaying a fixed list of batches
#[derive(Debug)]
pub struct VecInput {
    name: String,
    batches: std::vec::IntoIter<Batch>,
}

impl VecInput {
    pub fn new(name: impl Into<String>, batches: Vec<Batch>) -> Self {
        Self {
            name: name.into(),
            batches: batches.into_iter(),
        }
    }
}

#[async_trait]
impl Input for VecInput {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_batch(&mut self) -> Option<Batch> {
        self.batches.next()
    }
}

/// Input fed through a channel
///
/// Ends once every sender is dropped.
#[derive(Debug)]
pub struct ChannelInput {
    name: String,
    receiver: mpsc::Receiver<Batch>,
}

impl ChannelInput {
    /// Create an input and the sender that feeds it
    pub fn channel(name: impl Into<String>, capacity: usize) -> (mpsc::Sender<Batch>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            tx,
            Self {
                name: name.into(),
                receiver: rx,
            },
        )
    }
}

#[async_trait]
impl Input for ChannelInput {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_batch(&mut self) -> Option<Batch> {
        self.receiver.recv().await
    }
}

/// Default number of lines gathered into one batch
pub const DEFAULT_LINES_PER_BATCH: usize = 256;

/// Input reading one JSON object per line, all under one tag
///
/// Lines that are not JSON objects are kept as `{"log": <line>}`. Blank
/// lines are skipped. A batch holds whatever lines are already buffered,
/// up to `max_batch`, so a slow writer still sees its lines promptly.
pub struct JsonLinesInput<R> {
    name: String,
    tag: Tag,
    lines: Lines<BufReader<R>>,
    max_batch: usize,
    done: bool,
}

impl<R: AsyncRead + Unpin + Send> JsonLinesInput<R> {
    pub fn new(name: impl Into<String>, tag: Tag, reader: R) -> Self {
        Self {
            name: name.into(),
            tag,
            lines: BufReader::new(reader).lines(),
            max_batch: DEFAULT_LINES_PER_BATCH,
            done: false,
        }
    }

    /// Set the maximum number of lines per batch
    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }

    fn entry(&self, line: &str) -> Entry {
        let fields = decode_fields(line).unwrap_or_else(|_| {
            let mut fields = Fields::new();
            fields.insert("log", line);
            fields
        });
        Entry::new(self.tag.clone(), Record::now(fields))
    }

    async fn read_line(&mut self) -> Option<String> {
        match self.lines.next_line().await {
            Ok(Some(line)) => Some(line),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                warn!(input = %self.name, error = %e, "input read failed, closing");
                self.done = true;
                None
            }
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> Input for JsonLinesInput<R> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_batch(&mut self) -> Option<Batch> {
        let mut batch = Batch::new();

        while !self.done && batch.len() < self.max_batch {
            // Wait for the first line; after that only take what is buffered
            if !batch.is_empty() && self.lines.get_ref().buffer().is_empty() {
                break;
            }
            let Some(line) = self.read_line().await else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            batch.push(self.entry(line));
        }

        if batch.is_empty() { None } else { Some(batch) }
    }
}

impl<R> std::fmt::Debug for JsonLinesInput<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesInput")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("max_batch", &self.max_batch)
            .finish()
    }
}
