//! Tributary Protocol - Core record types
//!
//! This crate provides the values that flow through the pipeline:
//! - `Value` / `Fields` - Dynamic field values in an ordered map
//! - `Record` - Timestamp plus fields, immutable once emitted
//! - `Tag` - Routing label attached at ingestion, never rewritten
//! - `Entry` / `Batch` - Tagged records as handed between stages
//!
//! # Design Principles
//!
//! - **Move, don't share**: stages take records by value and return new ones
//! - **Cheap fan-out**: `Tag` is `Arc<str>`, chunks are shared as `Arc<Chunk>`
//! - **Order preserving**: `Fields` keeps insertion order end-to-end

mod error;
mod record;
mod tag;
mod value;

pub use error::ProtocolError;
pub use record::{Batch, Entry, Record};
pub use tag::Tag;
pub use value::{Fields, Value};

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Decode a JSON object into ordered fields
///
/// # Errors
///
/// Returns `ProtocolError::InvalidJson` if `input` is not valid JSON or is
/// valid JSON but not an object.
pub fn decode_fields(input: &str) -> Result<Fields> {
    Ok(serde_json::from_str::<Fields>(input)?)
}

// Test modules - only compiled during testing
#[cfg(test)]
mod error_test;
#[cfg(test)]
mod value_test;
