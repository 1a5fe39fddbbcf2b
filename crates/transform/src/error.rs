//! Filter error types
//!
//! `FilterError` is what filters and their factories return. Metadata
//! fetch failures (`FetchError`) and tag parse failures (`KeyParseError`)
//! are recovered inside the enrichment filter and never reach the caller.

use std::time::Duration;
use thiserror::Error;

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

/// Errors that can occur while building or running filters
#[derive(Debug, Error)]
pub enum FilterError {
    /// Filtering logic failed
    #[error("filter failed: {0}")]
    Failed(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Context cancelled
    #[error("operation cancelled")]
    Cancelled,
}

impl FilterError {
    /// Create a filter failed error
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Errors from the metadata endpoint
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    /// The request did not complete in time
    #[error("metadata request timed out after {0:?}")]
    Timeout(Duration),

    /// The endpoint answered with a non-success status
    #[error("metadata endpoint returned HTTP {status}")]
    Status {
        /// HTTP status code
        status: u16,
    },

    /// Connection refused, reset, DNS failure, ...
    #[error("metadata request failed: {0}")]
    Request(String),

    /// The body was not a usable metadata document
    #[error("invalid metadata document: {0}")]
    Decode(String),
}

impl FetchError {
    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Whether another attempt could plausibly succeed
    ///
    /// Client errors other than 408/429 are definitive (e.g. the pod does
    /// not exist), everything else is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status } => !(400..500).contains(status) || matches!(status, 408 | 429),
            Self::Decode(_) => false,
            Self::Timeout(_) | Self::Request(_) => true,
        }
    }
}

/// Why a tag could not be turned into a metadata key
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyParseError {
    /// Tag does not start with the configured prefix
    #[error("tag does not start with prefix '{0}'")]
    MissingPrefix(String),

    /// A required segment is absent or empty
    #[error("tag has no {0} segment")]
    MissingSegment(&'static str),

    /// Tag does not match the configured regex
    #[error("tag does not match the key pattern")]
    NoMatch,
}
