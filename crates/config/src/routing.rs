//! Routing configuration
//!
//! Every rule whose pattern matches a record's tag receives a copy of the
//! record; rules are evaluated in declaration order. A tag that matches no
//! rule is counted as unrouted and dropped.
//!
//! # Example
//!
//! ```toml
//! [[routing.rules]]
//! name = "kube"
//! match = "kube.*"
//! outputs = ["stdout", "archive"]
//!
//! [[routing.rules.filters]]
//! type = "kubernetes"
//!
//! [[routing.rules]]
//! match = "syslog.*"
//! outputs = ["archive"]
//! ```

use crate::filters::FilterInstanceConfig;
use serde::Deserialize;

/// Routing configuration - ordered list of rules
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Routing rules (evaluated in order, all matches fan out)
    pub rules: Vec<RoutingRule>,
}

impl RoutingConfig {
    /// Check if any routing rules are configured
    pub fn has_rules(&self) -> bool {
        !self.rules.is_empty()
    }

    /// Get all output names referenced in routing, first occurrence order
    pub fn referenced_outputs(&self) -> Vec<&str> {
        let mut outputs: Vec<&str> = Vec::new();

        for rule in &self.rules {
            for output in &rule.outputs {
                if !outputs.contains(&output.as_str()) {
                    outputs.push(output.as_str());
                }
            }
        }

        outputs
    }
}

/// A single routing rule
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingRule {
    /// Optional rule name for logs and errors (default: `rule-<index>`)
    #[serde(default)]
    pub name: Option<String>,

    /// Tag pattern; `*` matches any run of characters
    #[serde(rename = "match")]
    pub pattern: String,

    /// Outputs receiving matching records
    #[serde(default)]
    pub outputs: Vec<String>,

    /// Filters applied in order before buffering
    #[serde(default)]
    pub filters: Vec<FilterInstanceConfig>,
}

impl RoutingRule {
    /// Create a rule with no filters
    pub fn new(pattern: impl Into<String>, outputs: Vec<String>) -> Self {
        Self {
            name: None,
            pattern: pattern.into(),
            outputs,
            filters: Vec::new(),
        }
    }

    /// Name used in logs and errors
    pub fn display_name(&self, index: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("rule-{}", index),
        }
    }

    /// Check if this rule has any enabled filters
    pub fn has_filters(&self) -> bool {
        self.filters.iter().any(|f| f.enabled)
    }
}
