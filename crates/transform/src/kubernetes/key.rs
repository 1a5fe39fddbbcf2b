//! Metadata keys parsed from tags
//!
//! A tag such as `kube.default.web-7d9c.nginx` identifies the pod a record
//! came from. The namespace and pod name form the cache key; the container
//! is carried alongside so it can be attached to the record, but every
//! container of a pod shares one cache entry.

use crate::KeyParseError;
use regex::Regex;
use std::fmt;
use tributary_protocol::{Fields, Tag};

/// Cache key: namespace plus pod name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetadataKey {
    namespace: String,
    name: String,
}

impl MetadataKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    #[inline]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Everything recovered from a tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTag {
    pub key: MetadataKey,
    pub container: Option<String>,
}

impl ParsedTag {
    /// Identifier fields attached when no document is available
    pub fn identity_fields(&self) -> Fields {
        let mut fields = Fields::with_capacity(3);
        fields.insert("namespace", self.key.namespace());
        fields.insert("name", self.key.name());
        if let Some(container) = &self.container {
            fields.insert("container", container.as_str());
        }
        fields
    }
}

/// Extracts a `ParsedTag` from a tag
#[derive(Debug, Clone)]
pub enum TagParser {
    /// Strip `prefix`, then split on `delimiter`: namespace, name, [container]
    Segments { prefix: String, delimiter: char },
    /// Named captures `namespace`, `name` (or `pod_name`), optional `container`
    Regex(Regex),
}

impl TagParser {
    pub fn segments(prefix: impl Into<String>, delimiter: char) -> Self {
        Self::Segments {
            prefix: prefix.into(),
            delimiter,
        }
    }

    /// Build a regex parser
    ///
    /// The pattern must have a `namespace` group and a `name` or `pod_name`
    /// group.
    pub fn regex(pattern: &str) -> Result<Self, String> {
        let regex = Regex::new(pattern).map_err(|e| format!("invalid tag_regex: {}", e))?;
        let names: Vec<&str> = regex.capture_names().flatten().collect();

        if !names.contains(&"namespace") {
            return Err("tag_regex needs a 'namespace' capture group".into());
        }
        if !names.contains(&"name") && !names.contains(&"pod_name") {
            return Err("tag_regex needs a 'name' or 'pod_name' capture group".into());
        }

        Ok(Self::Regex(regex))
    }

    pub fn parse(&self, tag: &Tag) -> Result<ParsedTag, KeyParseError> {
        match self {
            Self::Segments { prefix, delimiter } => {
                parse_segments(tag.as_str(), prefix, *delimiter)
            }
            Self::Regex(regex) => parse_regex(tag.as_str(), regex),
        }
    }
}

fn parse_segments(tag: &str, prefix: &str, delimiter: char) -> Result<ParsedTag, KeyParseError> {
    let rest = tag
        .strip_prefix(prefix)
        .ok_or_else(|| KeyParseError::MissingPrefix(prefix.to_string()))?;

    // The container is everything after the second delimiter so that
    // container names may themselves contain the delimiter.
    let mut parts = rest.splitn(3, delimiter);
    let namespace = non_empty(parts.next()).ok_or(KeyParseError::MissingSegment("namespace"))?;
    let name = non_empty(parts.next()).ok_or(KeyParseError::MissingSegment("name"))?;
    let container = non_empty(parts.next()).map(str::to_string);

    Ok(ParsedTag {
        key: MetadataKey::new(namespace, name),
        container,
    })
}

fn parse_regex(tag: &str, regex: &Regex) -> Result<ParsedTag, KeyParseError> {
    let captures = regex.captures(tag).ok_or(KeyParseError::NoMatch)?;

    let namespace =
        group(&captures, "namespace").ok_or(KeyParseError::MissingSegment("namespace"))?;
    let name = group(&captures, "name")
        .or_else(|| group(&captures, "pod_name"))
        .ok_or(KeyParseError::MissingSegment("name"))?;
    let container = group(&captures, "container").map(str::to_string);

    Ok(ParsedTag {
        key: MetadataKey::new(namespace, name),
        container,
    })
}

fn group<'t>(captures: &regex::Captures<'t>, name: &str) -> Option<&'t str> {
    non_empty(captures.name(name).map(|m| m.as_str()))
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

#[cfg(test)]
#[path = "key_test.rs"]
mod tests;
