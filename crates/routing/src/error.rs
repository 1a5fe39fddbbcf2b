//! Routing error types
//!
//! Every variant is a configuration error: routing tables are compiled once
//! at startup and a bad table aborts initialization.

use thiserror::Error;

/// Result type for routing operations
pub type Result<T> = std::result::Result<T, RoutingError>;

/// Errors that can occur during routing table compilation
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Match pattern is the empty string
    #[error("match pattern must not be empty")]
    EmptyPattern,

    /// Output name not found in output registry
    #[error("unknown output '{name}' in routing configuration")]
    UnknownOutput {
        /// Name of the missing output
        name: String,
    },

    /// Two rules share a name
    #[error("duplicate route '{rule}'")]
    DuplicateRule {
        /// Rule that is defined twice
        rule: String,
    },

    /// Rule without any output
    #[error("route '{rule}' has no outputs")]
    EmptyOutputs {
        /// Rule with empty output list
        rule: String,
    },

    /// More outputs or rules than the id space allows
    #[error("too many {kind} (max {max})")]
    CapacityExceeded {
        /// "outputs" or "rules"
        kind: &'static str,
        /// Maximum supported
        max: usize,
    },
}

impl RoutingError {
    /// Create an UnknownOutput error
    #[inline]
    pub fn unknown_output(name: impl Into<String>) -> Self {
        Self::UnknownOutput { name: name.into() }
    }

    /// Create a DuplicateRule error
    #[inline]
    pub fn duplicate_rule(rule: impl Into<String>) -> Self {
        Self::DuplicateRule { rule: rule.into() }
    }

    /// Create an EmptyOutputs error
    #[inline]
    pub fn empty_outputs(rule: impl Into<String>) -> Self {
        Self::EmptyOutputs { rule: rule.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pattern_error() {
        let err = RoutingError::EmptyPattern;
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn test_unknown_output_error() {
        let err = RoutingError::unknown_output("es");
        assert!(err.to_string().contains("es"));
        assert!(err.to_string().contains("unknown output"));
    }

    #[test]
    fn test_duplicate_rule_error() {
        let err = RoutingError::duplicate_rule("kube");
        assert!(err.to_string().contains("kube"));
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_empty_outputs_error() {
        let err = RoutingError::empty_outputs("syslog");
        assert!(err.to_string().contains("syslog"));
        assert!(err.to_string().contains("no outputs"));
    }

    #[test]
    fn test_capacity_error() {
        let err = RoutingError::CapacityExceeded {
            kind: "outputs",
            max: 65535,
        };
        assert!(err.to_string().contains("too many outputs"));
    }
}
