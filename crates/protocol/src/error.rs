//! Protocol error types

use thiserror::Error;

/// Errors raised while constructing or decoding protocol values
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Tags must contain at least one character
    #[error("tag must not be empty")]
    EmptyTag,

    /// Input was not valid JSON, or not a JSON object
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}
