//! Configuration error types

use std::io;
use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("failed to read config file '{path}': {source}")]
    IoError {
        /// Path to the file
        path: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A routing rule references an output that is not declared
    #[error("rule '{rule}' references unknown output '{output}'")]
    UnknownOutput {
        /// Rule name
        rule: String,
        /// Name of the missing output
        output: String,
    },

    /// A routing rule uses a filter type nothing can build
    #[error("rule '{rule}' uses unknown filter type '{filter_type}'")]
    UnknownFilterType {
        /// Rule name
        rule: String,
        /// The unrecognised type
        filter_type: String,
    },

    /// Two components of the same kind share a name
    #[error("duplicate {component} name '{name}'")]
    DuplicateName {
        /// Component kind (e.g., "parser", "rule")
        component: &'static str,
        /// The repeated name
        name: String,
    },

    /// Validation error - required field missing
    #[error("{component} '{name}' is missing required field '{field}'")]
    MissingField {
        /// Component type (e.g., "rule", "parser")
        component: &'static str,
        /// Name of the component
        name: String,
        /// Missing field name
        field: &'static str,
    },

    /// Validation error - invalid value
    #[error("{component} '{name}' has invalid {field}: {message}")]
    InvalidValue {
        /// Component type
        component: &'static str,
        /// Name of the component
        name: String,
        /// Field name
        field: &'static str,
        /// Error message
        message: String,
    },
}

impl ConfigError {
    /// Create an UnknownOutput error
    pub fn unknown_output(rule: impl Into<String>, output: impl Into<String>) -> Self {
        Self::UnknownOutput {
            rule: rule.into(),
            output: output.into(),
        }
    }

    /// Create an UnknownFilterType error
    pub fn unknown_filter_type(rule: impl Into<String>, filter_type: impl Into<String>) -> Self {
        Self::UnknownFilterType {
            rule: rule.into(),
            filter_type: filter_type.into(),
        }
    }

    /// Create a DuplicateName error
    pub fn duplicate_name(component: &'static str, name: impl Into<String>) -> Self {
        Self::DuplicateName {
            component,
            name: name.into(),
        }
    }

    /// Create a MissingField error
    pub fn missing_field(
        component: &'static str,
        name: impl Into<String>,
        field: &'static str,
    ) -> Self {
        Self::MissingField {
            component,
            name: name.into(),
            field,
        }
    }

    /// Create an InvalidValue error
    pub fn invalid_value(
        component: &'static str,
        name: impl Into<String>,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            component,
            name: name.into(),
            field,
            message: message.into(),
        }
    }
}
