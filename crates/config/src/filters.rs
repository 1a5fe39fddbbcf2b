//! Filter configuration
//!
//! Defines filter instances applied per routing rule, in order. Each filter
//! has a type and type-specific options; the options are handed untouched
//! to the filter factory registered for that type.
//!
//! # Example
//!
//! ```toml
//! [[routing.rules]]
//! match = "kube.*"
//! outputs = ["stdout"]
//!
//! [[routing.rules.filters]]
//! type = "kubernetes"
//! kube_url = "http://127.0.0.1:8001"
//! merge_log = true
//! ```

use serde::Deserialize;
use std::collections::HashMap;

/// Configuration for a single filter instance
#[derive(Debug, Clone, Deserialize)]
pub struct FilterInstanceConfig {
    /// Filter type (e.g., "noop", "kubernetes")
    #[serde(rename = "type")]
    pub filter_type: String,

    /// Whether this filter is enabled (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Type-specific configuration options
    #[serde(flatten)]
    pub options: HashMap<String, toml::Value>,
}

fn default_true() -> bool {
    true
}

impl FilterInstanceConfig {
    /// Create a filter config of the given type with no options
    pub fn new(filter_type: impl Into<String>) -> Self {
        Self {
            filter_type: filter_type.into(),
            enabled: true,
            options: HashMap::new(),
        }
    }

    /// Set an option
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// Known filter types for validation
pub const KNOWN_FILTER_TYPES: &[&str] = &["noop", "kubernetes"];

/// Check if a filter type is known
pub fn is_known_filter_type(filter_type: &str) -> bool {
    KNOWN_FILTER_TYPES.contains(&filter_type)
}
