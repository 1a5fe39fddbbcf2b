//! On-disk form of an entry
//!
//! Every value carries its variant tag so a spilled record reads back as the
//! exact record that was written. Plain JSON would turn bytes into integer
//! arrays and non-finite floats into `null`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tributary_protocol::{Entry, Fields, Record, Tag, Value};

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct StoredEntry {
    tag: Tag,
    timestamp: DateTime<Utc>,
    fields: Vec<(String, StoredValue)>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "lowercase")]
enum StoredValue {
    Null,
    Bool(bool),
    Int(i64),
    /// IEEE-754 bits, so NaN and infinities survive
    Float(u64),
    Str(String),
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
    Map(Vec<(String, StoredValue)>),
    Array(Vec<StoredValue>),
}

impl StoredEntry {
    pub(super) fn from_entry(entry: &Entry) -> Self {
        Self {
            tag: entry.tag.clone(),
            timestamp: entry.record.timestamp(),
            fields: store_fields(entry.record.fields()),
        }
    }

    pub(super) fn into_entry(self) -> Entry {
        Entry::new(
            self.tag,
            Record::new(self.timestamp, load_fields(self.fields)),
        )
    }
}

fn store_fields(fields: &Fields) -> Vec<(String, StoredValue)> {
    fields
        .iter()
        .map(|(key, value)| (key.to_string(), StoredValue::from(value)))
        .collect()
}

fn load_fields(fields: Vec<(String, StoredValue)>) -> Fields {
    fields
        .into_iter()
        .map(|(key, value)| (key, Value::from(value)))
        .collect()
}

impl From<&Value> for StoredValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Int(i) => Self::Int(*i),
            Value::Float(f) => Self::Float(f.to_bits()),
            Value::Str(s) => Self::Str(s.clone()),
            Value::Bytes(b) => Self::Bytes(b.clone()),
            Value::Map(m) => Self::Map(store_fields(m)),
            Value::Array(a) => Self::Array(a.iter().map(StoredValue::from).collect()),
        }
    }
}

impl From<StoredValue> for Value {
    fn from(value: StoredValue) -> Self {
        match value {
            StoredValue::Null => Self::Null,
            StoredValue::Bool(b) => Self::Bool(b),
            StoredValue::Int(i) => Self::Int(i),
            StoredValue::Float(bits) => Self::Float(f64::from_bits(bits)),
            StoredValue::Str(s) => Self::Str(s),
            StoredValue::Bytes(b) => Self::Bytes(b),
            StoredValue::Map(m) => Self::Map(load_fields(m)),
            StoredValue::Array(a) => Self::Array(a.into_iter().map(Value::from).collect()),
        }
    }
}

mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
