//! Outputs - Where sealed chunks are delivered
//!
//! The engine hands each output an `Arc<Chunk>` on a spawned task. A
//! delivery either succeeds (the chunk is acknowledged and freed) or
//! fails with a `DeliveryError` (the chunk is retried with backoff).
//! Retries resend the whole chunk, so delivery is at least once.
//!
//! Built in:
//! - `StdoutOutput` - JSON lines on stdout
//! - `NullOutput` - discards everything, counting records
//! - `LibOutput` - hands each serialised record to a callback

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tributary_config::{NullOutputConfig, OutputConfig, StdoutOutputConfig};
use tributary_protocol::Record;

use crate::buffer::Chunk;
use crate::error::DeliveryError;

/// Destination for sealed chunks
#[async_trait]
pub trait Output: Send + Sync {
    /// Name for logging
    fn name(&self) -> &str;

    /// Deliver every entry of `chunk`, in order
    ///
    /// The chunk must not be kept after this returns.
    async fn deliver(&self, chunk: Arc<Chunk>) -> Result<(), DeliveryError>;
}

/// Build the output for a named config section
pub fn from_config(name: &str, config: &OutputConfig) -> Arc<dyn Output> {
    match config {
        OutputConfig::Stdout(c) => Arc::new(StdoutOutput::new(name, c)),
        OutputConfig::Null(c) => Arc::new(NullOutput::new(name, c)),
    }
}

/// Build a built-in output referenced without a config section
pub fn builtin(name: &str) -> Option<Arc<dyn Output>> {
    match name {
        "stdout" => Some(Arc::new(StdoutOutput::new(name, &StdoutOutputConfig::default()))),
        "null" => Some(Arc::new(NullOutput::new(name, &NullOutputConfig::default()))),
        _ => None,
    }
}

/// Encode a record as `[<unix seconds>, {fields}]`
pub fn encode_record(record: &Record) -> Result<Vec<u8>, DeliveryError> {
    serde_json::to_vec(&(record.unix_time(), record.fields()))
        .map_err(|e| DeliveryError::failed(format!("encode failed: {e}")))
}

/// Writes each record as a JSON line
///
/// With `include_tag` a line reads `[<tag>, <unix seconds>, {fields}]`,
/// otherwise `[<unix seconds>, {fields}]`.
pub struct StdoutOutput {
    name: String,
    include_tag: bool,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl StdoutOutput {
    pub fn new(name: impl Into<String>, config: &StdoutOutputConfig) -> Self {
        Self::with_writer(name, config.include_tag, Box::new(std::io::stdout()))
    }

    /// Write somewhere other than stdout
    pub fn with_writer(
        name: impl Into<String>,
        include_tag: bool,
        writer: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            name: name.into(),
            include_tag,
            writer: Mutex::new(writer),
        }
    }

    fn render(&self, chunk: &Chunk) -> serde_json::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(chunk.len() * 128);
        for entry in chunk.entries() {
            let record = &entry.record;
            if self.include_tag {
                serde_json::to_writer(
                    &mut out,
                    &(entry.tag.as_str(), record.unix_time(), record.fields()),
                )?;
            } else {
                serde_json::to_writer(&mut out, &(record.unix_time(), record.fields()))?;
            }
            out.push(b'\n');
        }
        Ok(out)
    }
}

#[async_trait]
impl Output for StdoutOutput {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, chunk: Arc<Chunk>) -> Result<(), DeliveryError> {
        let out = self
            .render(&chunk)
            .map_err(|e| DeliveryError::failed(format!("encode failed: {e}")))?;

        let mut writer = self.writer.lock();
        writer
            .write_all(&out)
            .and_then(|()| writer.flush())
            .map_err(|e| DeliveryError::failed(format!("write failed: {e}")))
    }
}

impl std::fmt::Debug for StdoutOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdoutOutput")
            .field("name", &self.name)
            .field("include_tag", &self.include_tag)
            .finish()
    }
}

/// Discards every chunk
#[derive(Debug)]
pub struct NullOutput {
    name: String,
    chunks: AtomicU64,
    records: AtomicU64,
}

impl NullOutput {
    pub fn new(name: impl Into<String>, _config: &NullOutputConfig) -> Self {
        Self {
            name: name.into(),
            chunks: AtomicU64::new(0),
            records: AtomicU64::new(0),
        }
    }

    /// Records discarded so far
    pub fn records(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    /// Chunks discarded so far
    pub fn chunks(&self) -> u64 {
        self.chunks.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Output for NullOutput {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, chunk: Arc<Chunk>) -> Result<(), DeliveryError> {
        self.chunks.fetch_add(1, Ordering::Relaxed);
        self.records.fetch_add(chunk.len() as u64, Ordering::Relaxed);
        Ok(())
    }
}

/// Callback invoked once per record by `LibOutput`
pub type RecordCallback = dyn Fn(&[u8]) -> Result<(), DeliveryError> + Send + Sync;

/// Library-mode output
///
/// Each record is encoded with `encode_record` and passed to the callback
/// as a byte slice. A callback error fails the whole chunk, which is then
/// retried from its first record.
pub struct LibOutput {
    name: String,
    callback: Arc<RecordCallback>,
}

impl LibOutput {
    pub fn new<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&[u8]) -> Result<(), DeliveryError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            callback: Arc::new(callback),
        }
    }
}

#[async_trait]
impl Output for LibOutput {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, chunk: Arc<Chunk>) -> Result<(), DeliveryError> {
        for entry in chunk.entries() {
            let encoded = encode_record(&entry.record)?;
            (self.callback)(&encoded)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for LibOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibOutput").field("name", &self.name).finish()
    }
}

#[cfg(test)]
#[path = "output_test.rs"]
mod tests;
