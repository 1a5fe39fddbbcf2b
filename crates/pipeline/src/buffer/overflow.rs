//! Overflow storage: chunks kept on disk once memory is full
//!
//! One file per chunk, one JSON-encoded entry per line, written in append
//! order and read back whole when the chunk is drained. Values are written
//! in their tagged on-disk form (see `stored`).

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tributary_protocol::Entry;

use super::chunk::ChunkId;
use super::stored::StoredEntry;
use crate::error::{PipelineError, Result};

#[cfg(test)]
#[path = "overflow_test.rs"]
mod tests;

/// Backing file for one spilled chunk
#[derive(Debug)]
pub struct OverflowFile {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    records: usize,
}

impl OverflowFile {
    /// Create (or truncate) the file for `id` under `dir`
    pub fn create(dir: &Path, id: ChunkId) -> Result<Self> {
        let path = dir.join(format!("chunk-{:016}.jsonl", id.get()));
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| PipelineError::overflow(&path, e))?;

        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            records: 0,
        })
    }

    /// Append one entry
    pub fn append(&mut self, entry: &Entry) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(PipelineError::overflow(
                &self.path,
                std::io::Error::other("overflow file already sealed"),
            ));
        };

        serde_json::to_writer(&mut *writer, &StoredEntry::from_entry(entry))
            .map_err(|e| PipelineError::overflow(&self.path, e.into()))?;
        writer
            .write_all(b"\n")
            .map_err(|e| PipelineError::overflow(&self.path, e))?;

        self.records += 1;
        Ok(())
    }

    /// Flush and close the writer; later appends fail
    pub fn seal(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .map_err(|e| PipelineError::overflow(&self.path, e))?;
        }
        Ok(())
    }

    /// Read every entry back in append order
    pub fn read_entries(&self) -> Result<Vec<Entry>> {
        let file = File::open(&self.path).map_err(|e| PipelineError::overflow(&self.path, e))?;
        let mut entries = Vec::with_capacity(self.records);

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| PipelineError::overflow(&self.path, e))?;
            if line.is_empty() {
                continue;
            }
            let stored: StoredEntry =
                serde_json::from_str(&line).map_err(|e| PipelineError::CorruptOverflow {
                    path: self.path.clone(),
                    line: index + 1,
                    message: e.to_string(),
                })?;
            entries.push(stored.into_entry());
        }

        Ok(entries)
    }

    /// Delete the backing file
    pub fn remove(mut self) -> Result<()> {
        self.writer = None;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PipelineError::overflow(&self.path, e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> usize {
        self.records
    }
}
