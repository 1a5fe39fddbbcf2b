//! Tests for Value and Fields

use crate::decode_fields;
use crate::value::{Fields, Value};

// =============================================================================
// Fields ordering and mutation
// =============================================================================

#[test]
fn test_fields_preserve_insertion_order() {
    let mut fields = Fields::new();
    fields.insert("zeta", 1);
    fields.insert("alpha", 2);
    fields.insert("mid", 3);

    let keys: Vec<_> = fields.keys().collect();
    assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
}

#[test]
fn test_fields_insert_replaces_in_place() {
    let mut fields = Fields::new();
    fields.insert("a", 1);
    fields.insert("b", 2);

    let previous = fields.insert("a", "updated");
    assert_eq!(previous, Some(Value::Int(1)));

    let keys: Vec<_> = fields.keys().collect();
    assert_eq!(keys, vec!["a", "b"]);
    assert_eq!(fields.get("a"), Some(&Value::from("updated")));
}

#[test]
fn test_fields_remove() {
    let mut fields: Fields = [("a", 1), ("b", 2), ("c", 3)].into_iter().collect();
    assert_eq!(fields.remove("b"), Some(Value::Int(2)));
    assert_eq!(fields.remove("missing"), None);

    let keys: Vec<_> = fields.keys().collect();
    assert_eq!(keys, vec!["a", "c"]);
}

#[test]
fn test_fields_merge_overrides() {
    let mut base: Fields = [("a", 1), ("b", 2)].into_iter().collect();
    let other: Fields = [("b", 20), ("c", 30)].into_iter().collect();
    base.merge(other);

    assert_eq!(base.get("a"), Some(&Value::Int(1)));
    assert_eq!(base.get("b"), Some(&Value::Int(20)));
    assert_eq!(base.get("c"), Some(&Value::Int(30)));
    assert_eq!(base.len(), 3);
}

#[test]
fn test_fields_get_path() {
    let labels: Fields = [("app", "alpha")].into_iter().collect();
    let mut meta = Fields::new();
    meta.insert("labels", labels);
    let mut root = Fields::new();
    root.insert("meta", meta);

    assert_eq!(
        root.get_path(&["meta", "labels", "app"]),
        Some(&Value::from("alpha"))
    );
    assert_eq!(root.get_path(&["meta", "labels", "missing"]), None);
    assert_eq!(root.get_path(&["meta", "labels", "app", "deeper"]), None);
    assert_eq!(root.get_path(&[]), None);
}

// =============================================================================
// JSON round trips through serde
// =============================================================================

#[test]
fn test_decode_fields_keeps_document_order() {
    let fields = decode_fields(r#"{"b": 1, "a": "x", "c": {"z": true, "y": null}}"#).unwrap();
    let keys: Vec<_> = fields.keys().collect();
    assert_eq!(keys, vec!["b", "a", "c"]);

    let nested = fields.get("c").and_then(Value::as_map).unwrap();
    let nested_keys: Vec<_> = nested.keys().collect();
    assert_eq!(nested_keys, vec!["z", "y"]);
    assert!(nested.get("y").unwrap().is_null());
}

#[test]
fn test_decode_fields_rejects_non_objects() {
    assert!(decode_fields("[1, 2]").is_err());
    assert!(decode_fields("\"text\"").is_err());
    assert!(decode_fields("{not json").is_err());
}

#[test]
fn test_serialize_fields_in_order() {
    let fields: Fields = [("second", Value::from(2)), ("first", Value::from("one"))]
        .into_iter()
        .collect();
    let json = serde_json::to_string(&fields).unwrap();
    assert_eq!(json, r#"{"second":2,"first":"one"}"#);
}

#[test]
fn test_numbers_decode_to_int_or_float() {
    let fields = decode_fields(r#"{"i": 42, "f": 1.5, "big": 18446744073709551615}"#).unwrap();
    assert_eq!(fields.get("i"), Some(&Value::Int(42)));
    assert_eq!(fields.get("f"), Some(&Value::Float(1.5)));
    assert!(matches!(fields.get("big"), Some(Value::Float(_))));
}

#[test]
fn test_from_serde_json_value() {
    let json = serde_json::json!({"labels": {"app": "alpha"}, "ports": [80, 443]});
    let value = Value::from(json);
    let map = value.as_map().unwrap();
    assert_eq!(
        map.get_path(&["labels", "app"]).and_then(Value::as_str),
        Some("alpha")
    );
    assert_eq!(map.get("ports").and_then(Value::as_array).map(<[_]>::len), Some(2));
}

// =============================================================================
// Accessors and sizing
// =============================================================================

#[test]
fn test_accessors() {
    assert_eq!(Value::from("x").as_str(), Some("x"));
    assert_eq!(Value::from(7).as_i64(), Some(7));
    assert_eq!(Value::from(7).as_f64(), Some(7.0));
    assert_eq!(Value::from(true).as_bool(), Some(true));
    assert_eq!(Value::Null.as_str(), None);
    assert_eq!(Value::from(vec![1u8, 2]).type_name(), "binary");
}

#[test]
fn test_display() {
    assert_eq!(Value::from("plain").to_string(), "plain");
    assert_eq!(Value::from(3).to_string(), "3");
    assert_eq!(Value::Null.to_string(), "null");
}

#[test]
fn test_estimated_size_grows_with_content() {
    let small: Fields = [("k", "v")].into_iter().collect();
    let large: Fields = [("k", "v".repeat(1000))].into_iter().collect();
    assert!(large.estimated_size() > small.estimated_size() + 900);
}
