//! Tests for overflow files

use super::*;
use tributary_protocol::{Fields, Record, Tag, Value};

fn entry(seq: i64) -> Entry {
    Entry::new(
        Tag::new("app.web").unwrap(),
        Record::now(Fields::new()).with_field("seq", seq),
    )
}

#[test]
fn test_append_and_read_back_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut file = OverflowFile::create(dir.path(), ChunkId::new(7)).unwrap();

    let written: Vec<Entry> = (0..5).map(entry).collect();
    for e in &written {
        file.append(e).unwrap();
    }
    file.seal().unwrap();

    assert_eq!(file.records(), 5);
    assert!(file.path().ends_with("chunk-0000000000000007.jsonl"));
    assert_eq!(file.read_entries().unwrap(), written);
}

#[test]
fn test_append_after_seal_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut file = OverflowFile::create(dir.path(), ChunkId::new(1)).unwrap();
    file.seal().unwrap();

    assert!(matches!(
        file.append(&entry(1)),
        Err(PipelineError::Overflow { .. })
    ));
}

#[test]
fn test_remove_deletes_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut file = OverflowFile::create(dir.path(), ChunkId::new(2)).unwrap();
    file.append(&entry(1)).unwrap();
    file.seal().unwrap();

    let path = file.path().to_path_buf();
    assert!(path.exists());
    file.remove().unwrap();
    assert!(!path.exists());
}

#[test]
fn test_corrupt_line_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut file = OverflowFile::create(dir.path(), ChunkId::new(3)).unwrap();
    file.append(&entry(1)).unwrap();
    file.seal().unwrap();

    let mut raw = OpenOptions::new().append(true).open(file.path()).unwrap();
    writeln!(raw, "not json").unwrap();

    match file.read_entries() {
        Err(PipelineError::CorruptOverflow { line, .. }) => assert_eq!(line, 2),
        other => panic!("expected CorruptOverflow, got {:?}", other),
    }
}

#[test]
fn test_create_in_missing_dir_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    assert!(OverflowFile::create(&missing, ChunkId::new(1)).is_err());
}

#[test]
fn test_binary_and_non_finite_values_read_back_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let mut file = OverflowFile::create(dir.path(), ChunkId::new(4)).unwrap();

    let nested: Fields = [("raw", Value::Bytes(vec![9, 8]))].into_iter().collect();
    let fields: Fields = [
        ("blob", Value::Bytes(vec![1, 2, 3, 255])),
        ("inf", Value::Float(f64::INFINITY)),
        ("neg_inf", Value::Float(f64::NEG_INFINITY)),
        ("ratio", Value::Float(0.25)),
        ("ints", Value::Array(vec![Value::Int(1), Value::Int(2)])),
        ("nested", Value::Map(nested)),
        ("none", Value::Null),
    ]
    .into_iter()
    .collect();
    let written = Entry::new(Tag::new("app.bin").unwrap(), Record::now(fields));
    let not_a_number = Entry::new(
        Tag::new("app.bin").unwrap(),
        Record::now(Fields::new()).with_field("nan", Value::Float(f64::NAN)),
    );

    file.append(&written).unwrap();
    file.append(&not_a_number).unwrap();
    file.seal().unwrap();

    let back = file.read_entries().unwrap();
    assert_eq!(back.len(), 2);
    assert_eq!(back[0], written);
    assert_eq!(back[0].record.get("blob"), Some(&Value::Bytes(vec![1, 2, 3, 255])));
    assert_eq!(back[1].record.timestamp(), not_a_number.record.timestamp());
    assert!(matches!(back[1].record.get("nan"), Some(Value::Float(f)) if f.is_nan()));
}
