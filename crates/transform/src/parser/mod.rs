//! Line parsers
//!
//! Parsers turn a raw log line into fields. They are declared once in
//! config (`[[parsers]]`) and looked up by name, typically from a pod's
//! `<annotation_prefix>/parser` annotation.

mod json;
mod regex;

pub use self::json::JsonParser;
pub use self::regex::RegexParser;

use crate::{FilterError, FilterResult};
use std::collections::HashMap;
use std::sync::Arc;
use tributary_config::{ParserConfig, ParserFormat};
use tributary_protocol::Fields;

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

/// Turns a log line into structured fields
pub trait LineParser: Send + Sync {
    /// Parse `line`, or `None` if it does not have this parser's shape
    fn parse(&self, line: &str) -> Option<Fields>;

    /// Name the parser is registered under
    fn name(&self) -> &str;
}

/// Parsers by name
#[derive(Default, Clone)]
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn LineParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every parser declared in config
    ///
    /// # Errors
    /// Returns `FilterError::Config` for an invalid regex, a regex without
    /// named captures or a duplicate name.
    pub fn from_configs(configs: &[ParserConfig]) -> FilterResult<Self> {
        let mut registry = Self::new();

        for config in configs {
            let parser: Arc<dyn LineParser> = match config.format {
                ParserFormat::Json => Arc::new(JsonParser::new(&config.name)),
                ParserFormat::Regex => {
                    let pattern = config.regex.as_deref().ok_or_else(|| {
                        FilterError::config(format!("parser '{}' has no regex", config.name))
                    })?;
                    Arc::new(
                        RegexParser::new(&config.name, pattern)?.with_types(config.types.clone()),
                    )
                }
            };
            registry.register(parser)?;
        }

        Ok(registry)
    }

    /// Add a parser
    ///
    /// # Errors
    /// Returns `FilterError::Config` if the name is taken.
    pub fn register(&mut self, parser: Arc<dyn LineParser>) -> FilterResult<()> {
        let name = parser.name().to_string();
        if self.parsers.contains_key(&name) {
            return Err(FilterError::config(format!(
                "parser '{}' defined more than once",
                name
            )));
        }
        self.parsers.insert(name, parser);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn LineParser> {
        self.parsers.get(name).map(|p| p.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parsers.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.parsers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("parsers", &self.names())
            .finish()
    }
}
