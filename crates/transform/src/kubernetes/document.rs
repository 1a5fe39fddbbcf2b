//! Metadata documents
//!
//! Two response shapes are accepted. A pod object as served by the
//! orchestrator API:
//!
//! ```json
//! {"metadata": {"name": "web-1", "namespace": "prod", "uid": "...",
//!               "labels": {...}, "annotations": {...}},
//!  "spec": {"nodeName": "node-3"}}
//! ```
//!
//! or, when there is no `metadata` object, a flat document with the same
//! fields at the top level (`namespace`, `name`, `id`/`uid`, `host`,
//! `labels`, `annotations`).

use crate::FetchError;
use crate::kubernetes::ParsedTag;
use serde_json::Value as Json;
use tributary_protocol::{Fields, Value};

/// Metadata for one pod
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataDocument {
    namespace: Option<String>,
    name: Option<String>,
    id: Option<String>,
    host: Option<String>,
    labels: Fields,
    annotations: Fields,
}

impl MetadataDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an endpoint response body
    ///
    /// # Errors
    /// Returns `FetchError::Decode` if `body` is not a JSON object or its
    /// `labels`/`annotations` are not objects.
    pub fn from_json(body: &Json) -> Result<Self, FetchError> {
        let root = body
            .as_object()
            .ok_or_else(|| FetchError::decode("document is not an object"))?;

        match root.get("metadata") {
            Some(Json::Object(metadata)) => Ok(Self {
                namespace: string_field(metadata.get("namespace")),
                name: string_field(metadata.get("name")),
                id: string_field(metadata.get("uid")),
                host: string_field(body.pointer("/spec/nodeName")),
                labels: map_field("labels", metadata.get("labels"))?,
                annotations: map_field("annotations", metadata.get("annotations"))?,
            }),
            _ => Ok(Self {
                namespace: string_field(root.get("namespace")),
                name: string_field(root.get("name")),
                id: string_field(root.get("id").or_else(|| root.get("uid"))),
                host: string_field(root.get("host")),
                labels: map_field("labels", root.get("labels"))?,
                annotations: map_field("annotations", root.get("annotations"))?,
            }),
        }
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.labels.insert(key, value);
        self
    }

    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.annotations.insert(key, value);
        self
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn labels(&self) -> &Fields {
        &self.labels
    }

    pub fn annotations(&self) -> &Fields {
        &self.annotations
    }

    /// String value of an annotation
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).and_then(Value::as_str)
    }

    /// Fields merged into an enriched record
    ///
    /// Identifiers missing from the document fall back to the ones parsed
    /// from the tag; the container always comes from the tag.
    pub fn to_fields(&self, parsed: &ParsedTag) -> Fields {
        let mut fields = Fields::with_capacity(7);

        fields.insert(
            "namespace",
            self.namespace.as_deref().unwrap_or(parsed.key.namespace()),
        );
        fields.insert("name", self.name.as_deref().unwrap_or(parsed.key.name()));
        if let Some(container) = &parsed.container {
            fields.insert("container", container.as_str());
        }
        if let Some(id) = &self.id {
            fields.insert("id", id.as_str());
        }
        if let Some(host) = &self.host {
            fields.insert("host", host.as_str());
        }
        if !self.labels.is_empty() {
            fields.insert("labels", self.labels.clone());
        }
        if !self.annotations.is_empty() {
            fields.insert("annotations", self.annotations.clone());
        }

        fields
    }
}

fn string_field(value: Option<&Json>) -> Option<String> {
    value.and_then(Json::as_str).map(str::to_string)
}

fn map_field(field: &str, value: Option<&Json>) -> Result<Fields, FetchError> {
    match value {
        None | Some(Json::Null) => Ok(Fields::new()),
        Some(Json::Object(map)) => Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.clone())))
            .collect()),
        Some(other) => Err(FetchError::decode(format!(
            "'{}' must be an object, got {}",
            field, other
        ))),
    }
}

#[cfg(test)]
#[path = "document_test.rs"]
mod tests;
