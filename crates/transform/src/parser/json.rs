use super::LineParser;
use tributary_protocol::{Fields, decode_fields};

/// Parses lines holding a JSON object
#[derive(Debug, Clone)]
pub struct JsonParser {
    name: String,
}

impl JsonParser {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl LineParser for JsonParser {
    fn parse(&self, line: &str) -> Option<Fields> {
        decode_fields(line.trim_end()).ok()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
