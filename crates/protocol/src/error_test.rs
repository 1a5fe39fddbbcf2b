//! Tests for protocol error types

use crate::{ProtocolError, Tag, decode_fields};

#[test]
fn test_empty_tag_error() {
    let err = Tag::new("").unwrap_err();
    assert!(matches!(err, ProtocolError::EmptyTag));
    assert_eq!(err.to_string(), "tag must not be empty");
}

#[test]
fn test_invalid_json_error() {
    let err = decode_fields("{not json").unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidJson(_)));
    assert!(err.to_string().starts_with("invalid JSON"));
}

#[test]
fn test_non_object_is_invalid_json() {
    assert!(matches!(
        decode_fields("[1, 2, 3]"),
        Err(ProtocolError::InvalidJson(_))
    ));
    assert!(matches!(
        decode_fields("\"plain\""),
        Err(ProtocolError::InvalidJson(_))
    ));
}
