//! Records and tagged entries
//!
//! A `Record` is a timestamp plus ordered fields. Records are treated as
//! immutable once a stage has emitted them: every transformation consumes
//! the record and hands back a new one, so a stage can never observe a
//! half-modified record owned by someone else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tag::Tag;
use crate::value::{Fields, Value};

/// A single structured log/metric record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    timestamp: DateTime<Utc>,
    fields: Fields,
}

impl Record {
    pub fn new(timestamp: DateTime<Utc>, fields: Fields) -> Self {
        Self { timestamp, fields }
    }

    /// Create a record stamped with the current wall-clock time
    pub fn now(fields: Fields) -> Self {
        Self::new(Utc::now(), fields)
    }

    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[inline]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Consume the record, returning its fields
    pub fn into_fields(self) -> Fields {
        self.fields
    }

    pub fn into_parts(self) -> (DateTime<Utc>, Fields) {
        (self.timestamp, self.fields)
    }

    /// Return a new record with `key` set to `value`
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key, value);
        self
    }

    /// Return a new record with all of `fields` merged over the existing ones
    #[must_use]
    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields.merge(fields);
        self
    }

    /// Return a new record without `key`
    #[must_use]
    pub fn without_field(mut self, key: &str) -> Self {
        self.fields.remove(key);
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Approximate in-memory size (timestamp + fields)
    pub fn estimated_size(&self) -> usize {
        12 + self.fields.estimated_size()
    }

    /// Seconds since the Unix epoch with sub-second precision
    pub fn unix_time(&self) -> f64 {
        self.timestamp.timestamp() as f64
            + f64::from(self.timestamp.timestamp_subsec_nanos()) / 1_000_000_000.0
    }
}

/// A record together with the tag it was ingested under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub tag: Tag,
    pub record: Record,
}

impl Entry {
    #[inline]
    pub fn new(tag: Tag, record: Record) -> Self {
        Self { tag, record }
    }

    pub fn estimated_size(&self) -> usize {
        self.tag.as_str().len() + self.record.estimated_size()
    }
}

/// Ordered group of entries handed between pipeline stages
pub type Batch = Vec<Entry>;
