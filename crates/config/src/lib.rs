//! Tributary Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! Minimal config should just work - only specify what you need to change.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use tributary_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str(
//!     "[[routing.rules]]\nmatch = \"app.*\"\noutputs = [\"stdout\"]",
//! )
//! .unwrap();
//! assert_eq!(config.routing.rules.len(), 1);
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [engine]
//! flush_interval = "1s"
//!
//! [buffer]
//! memory_limit = 67108864
//! overflow_dir = "/var/lib/tributary/overflow"
//!
//! [retry]
//! max_attempts = 5
//!
//! [[parsers]]
//! name = "json"
//! format = "json"
//!
//! [outputs.console]
//! type = "stdout"
//!
//! [[routing.rules]]
//! match = "kube.*"
//! outputs = ["console"]
//!
//! [[routing.rules.filters]]
//! type = "kubernetes"
//! kube_url = "http://127.0.0.1:8001"
//! ```

mod engine;
mod error;
mod filters;
mod logging;
mod outputs;
mod parsers;
mod routing;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use engine::{BufferConfig, EngineConfig, RetryConfig};
pub use error::{ConfigError, Result};
pub use filters::{FilterInstanceConfig, KNOWN_FILTER_TYPES, is_known_filter_type};
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use outputs::{
    BUILTIN_OUTPUTS, NullOutputConfig, OutputConfig, OutputsConfig, StdoutOutputConfig,
};
pub use parsers::{FieldType, ParserConfig, ParserFormat};
pub use routing::{RoutingConfig, RoutingRule};

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Scheduler settings
    pub engine: EngineConfig,

    /// Chunk buffer settings
    pub buffer: BufferConfig,

    /// Delivery retry settings
    pub retry: RetryConfig,

    /// Named line parsers
    pub parsers: Vec<ParserConfig>,

    /// Named outputs
    pub outputs: OutputsConfig,

    /// Routing rules (tag pattern → filters → outputs)
    pub routing: RoutingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, contains invalid TOML or
    /// fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Names of enabled outputs referenced by at least one rule
    pub fn active_outputs(&self) -> Vec<&str> {
        self.routing
            .referenced_outputs()
            .into_iter()
            .filter(|name| self.outputs.get(name).is_none_or(|o| o.is_enabled()))
            .collect()
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
