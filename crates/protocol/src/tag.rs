//! Record tags
//!
//! A `Tag` names where a record came from and is the only input to routing
//! decisions. Tags are immutable after ingestion; cloning is a reference
//! count bump, so fanning one record out to many routes stays cheap.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ProtocolError;

/// Immutable routing tag, e.g. `kube.var.log.containers.web_default_app.log`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(Arc<str>);

impl Tag {
    /// Create a tag
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::EmptyTag` for an empty string; an empty tag
    /// can never be routed and is treated as a configuration error.
    pub fn new(tag: impl AsRef<str>) -> Result<Self, ProtocolError> {
        let tag = tag.as_ref();
        if tag.is_empty() {
            return Err(ProtocolError::EmptyTag);
        }
        Ok(Self(Arc::from(tag)))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over `delimiter`-separated segments
    pub fn segments(&self, delimiter: char) -> impl Iterator<Item = &str> {
        self.0.split(delimiter)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Tag {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for Tag {
    type Error = ProtocolError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl TryFrom<String> for Tag {
    type Error = ProtocolError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Tag::new(s).map_err(serde::de::Error::custom)
    }
}
