//! Output configuration
//!
//! Named output instances referenced by routing rules. `stdout` and `null`
//! are built in and may be referenced without being declared.
//!
//! # Example
//!
//! ```toml
//! [outputs.console]
//! type = "stdout"
//!
//! [outputs.discard]
//! type = "null"
//! enabled = false
//! ```

use serde::Deserialize;
use std::collections::HashMap;

/// Outputs that exist without a `[outputs.<name>]` section
pub const BUILTIN_OUTPUTS: &[&str] = &["stdout", "null"];

/// Named output instances
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputsConfig {
    #[serde(flatten)]
    outputs: HashMap<String, OutputConfig>,
}

impl OutputsConfig {
    /// Get an output by name
    pub fn get(&self, name: &str) -> Option<&OutputConfig> {
        self.outputs.get(name)
    }

    /// Check if an output is declared or built in
    pub fn contains(&self, name: &str) -> bool {
        self.outputs.contains_key(name) || BUILTIN_OUTPUTS.contains(&name)
    }

    /// Iterate over declared outputs
    pub fn iter(&self) -> impl Iterator<Item = (&String, &OutputConfig)> {
        self.outputs.iter()
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Insert an output (used by tests and programmatic setups)
    pub fn insert(&mut self, name: impl Into<String>, output: OutputConfig) {
        self.outputs.insert(name.into(), output);
    }
}

/// Configuration for a single output instance
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputConfig {
    /// Writes each record as a JSON line to stdout
    Stdout(StdoutOutputConfig),

    /// Discards everything (benchmarking, dry runs)
    Null(NullOutputConfig),
}

impl OutputConfig {
    /// Check if the output is enabled
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Stdout(c) => c.enabled,
            Self::Null(c) => c.enabled,
        }
    }

    /// Type name as written in config
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Stdout(_) => "stdout",
            Self::Null(_) => "null",
        }
    }
}

/// Stdout output settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StdoutOutputConfig {
    /// Whether this output is enabled
    /// Default: true
    pub enabled: bool,

    /// Prefix each line with the record tag
    /// Default: true
    pub include_tag: bool,
}

impl Default for StdoutOutputConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include_tag: true,
        }
    }
}

/// Null output settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NullOutputConfig {
    /// Whether this output is enabled
    /// Default: true
    pub enabled: bool,
}

impl Default for NullOutputConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
