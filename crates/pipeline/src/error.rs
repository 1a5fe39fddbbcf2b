//! Pipeline error types

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tributary_routing::RoutingError;
use tributary_transform::FilterError;

/// Errors building or running the engine
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid route table
    #[error("routing error: {0}")]
    Routing(#[from] RoutingError),

    /// Filter could not be created
    #[error("filter error in rule '{rule}': {source}")]
    Filter {
        rule: String,
        #[source]
        source: FilterError,
    },

    /// A routed output has no implementation
    #[error("no output registered for '{0}'")]
    MissingOutput(String),

    /// Engine assembled without a routing table
    #[error("engine has no routing table")]
    NoRoutingTable,

    /// Overflow storage I/O failed
    #[error("overflow storage error at {}: {source}", path.display())]
    Overflow {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Overflow file holds a line that is not an entry
    #[error("corrupt overflow file {} at line {line}: {message}", path.display())]
    CorruptOverflow {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Engine task panicked or was aborted
    #[error("engine task failed: {0}")]
    EngineTask(String),
}

impl PipelineError {
    pub fn filter(rule: impl Into<String>, source: FilterError) -> Self {
        Self::Filter {
            rule: rule.into(),
            source,
        }
    }

    pub fn overflow(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Overflow {
            path: path.into(),
            source,
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Why an output could not deliver a chunk
///
/// Every variant is retried with backoff until the chunk runs out of
/// attempts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The destination rejected or failed the write
    #[error("delivery failed: {0}")]
    Failed(String),

    /// `deliver` did not return within the delivery timeout
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    /// The destination is gone
    #[error("output closed")]
    Closed,
}

impl DeliveryError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::MissingOutput("archive".into());
        assert!(err.to_string().contains("archive"));

        let err = PipelineError::filter("kube", FilterError::config("bad option"));
        assert!(err.to_string().contains("kube"));
        assert!(err.to_string().contains("bad option"));

        let err = PipelineError::overflow(
            "/tmp/chunk.jsonl",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("/tmp/chunk.jsonl"));

        let err = PipelineError::from(RoutingError::unknown_output("x"));
        assert!(matches!(err, PipelineError::Routing(_)));
    }

    #[test]
    fn test_delivery_error_display() {
        assert!(DeliveryError::failed("503").to_string().contains("503"));
        assert!(
            DeliveryError::Timeout(Duration::from_secs(2))
                .to_string()
                .contains("2s")
        );
        assert_eq!(DeliveryError::Closed.to_string(), "output closed");
    }
}
