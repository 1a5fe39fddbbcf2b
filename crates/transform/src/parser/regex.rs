//! Regex line parser
//!
//! Every named capture group becomes a field. Captures are strings unless
//! a type is configured for them; a value that does not convert stays a
//! string rather than failing the whole line.

use super::LineParser;
use crate::{FilterError, FilterResult};
use regex::Regex;
use std::collections::HashMap;
use tributary_config::FieldType;
use tributary_protocol::{Fields, Value};

/// Parses lines with a regular expression with named captures
#[derive(Debug, Clone)]
pub struct RegexParser {
    name: String,
    regex: Regex,
    types: HashMap<String, FieldType>,
}

impl RegexParser {
    /// Compile a parser
    ///
    /// # Errors
    /// Returns `FilterError::Config` if the pattern does not compile or has
    /// no named capture groups.
    pub fn new(name: impl Into<String>, pattern: &str) -> FilterResult<Self> {
        let name = name.into();
        let regex = Regex::new(pattern)
            .map_err(|e| FilterError::config(format!("parser '{}': invalid regex: {}", name, e)))?;

        if regex.capture_names().flatten().next().is_none() {
            return Err(FilterError::config(format!(
                "parser '{}': regex has no named capture groups",
                name
            )));
        }

        Ok(Self {
            name,
            regex,
            types: HashMap::new(),
        })
    }

    /// Set type coercions for captured fields
    #[must_use]
    pub fn with_types(mut self, types: HashMap<String, FieldType>) -> Self {
        self.types = types;
        self
    }

    fn convert(&self, field: &str, raw: &str) -> Value {
        let converted = match self.types.get(field) {
            Some(FieldType::Integer) => raw.parse::<i64>().ok().map(Value::Int),
            Some(FieldType::Float) => raw.parse::<f64>().ok().map(Value::Float),
            Some(FieldType::Bool) => raw.parse::<bool>().ok().map(Value::Bool),
            Some(FieldType::String) | None => None,
        };
        converted.unwrap_or_else(|| Value::Str(raw.to_string()))
    }
}

impl LineParser for RegexParser {
    fn parse(&self, line: &str) -> Option<Fields> {
        let captures = self.regex.captures(line)?;
        let mut fields = Fields::new();

        for field in self.regex.capture_names().flatten() {
            if let Some(m) = captures.name(field) {
                fields.insert(field, self.convert(field, m.as_str()));
            }
        }

        Some(fields)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
