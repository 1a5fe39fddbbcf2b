//! Line parser definitions
//!
//! Parsers are declared once at the top level and referenced by name from
//! pod annotations (`<annotation_prefix>/parser`).
//!
//! # Example
//!
//! ```toml
//! [[parsers]]
//! name = "nginx"
//! format = "regex"
//! regex = '^(?<remote>\S+) (?<method>\S+) (?<path>\S+) (?<code>\d+)$'
//! types = { code = "integer" }
//!
//! [[parsers]]
//! name = "json"
//! format = "json"
//! ```

use serde::Deserialize;
use std::collections::HashMap;

/// How a parser interprets a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserFormat {
    /// Named captures of a regular expression
    Regex,
    /// A JSON object
    Json,
}

/// Type coercion applied to a captured field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Keep as string
    String,
    /// Parse as i64
    #[serde(alias = "int")]
    Integer,
    /// Parse as f64
    Float,
    /// Parse as bool
    #[serde(alias = "boolean")]
    Bool,
}

/// A single `[[parsers]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct ParserConfig {
    /// Name used by annotations to select this parser
    pub name: String,

    /// Parsing strategy
    pub format: ParserFormat,

    /// Pattern with named captures (required for `format = "regex"`)
    #[serde(default)]
    pub regex: Option<String>,

    /// Per-field type coercion (regex parsers only)
    #[serde(default)]
    pub types: HashMap<String, FieldType>,
}

impl ParserConfig {
    /// Create a JSON parser definition
    pub fn json(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: ParserFormat::Json,
            regex: None,
            types: HashMap::new(),
        }
    }

    /// Create a regex parser definition
    pub fn regex(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: ParserFormat::Regex,
            regex: Some(pattern.into()),
            types: HashMap::new(),
        }
    }

    /// Add a type coercion for a captured field
    #[must_use]
    pub fn with_type(mut self, field: impl Into<String>, field_type: FieldType) -> Self {
        self.types.insert(field.into(), field_type);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_regex_parser() {
        let toml = r#"
name = "kv"
format = "regex"
regex = '^(?<key>\w+)=(?<value>\d+)$'
types = { value = "int" }
"#;
        let config: ParserConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.name, "kv");
        assert_eq!(config.format, ParserFormat::Regex);
        assert!(config.regex.as_deref().unwrap().contains("?<key>"));
        assert_eq!(config.types.get("value"), Some(&FieldType::Integer));
    }

    #[test]
    fn test_deserialize_json_parser() {
        let config: ParserConfig = toml::from_str("name = \"j\"\nformat = \"json\"").unwrap();
        assert_eq!(config.format, ParserFormat::Json);
        assert!(config.regex.is_none());
        assert!(config.types.is_empty());
    }

    #[test]
    fn test_unknown_format_rejected() {
        let result: Result<ParserConfig, _> = toml::from_str("name = \"x\"\nformat = \"ltsv\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_builders() {
        let config = ParserConfig::regex("p", "(?<n>\\d+)").with_type("n", FieldType::Float);
        assert_eq!(config.format, ParserFormat::Regex);
        assert_eq!(config.types.get("n"), Some(&FieldType::Float));
        assert_eq!(ParserConfig::json("j").format, ParserFormat::Json);
    }
}
