use super::*;

use anyhow::anyhow;
use chrono::NaiveDateTime;
use serde_json::{Value, json};

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture must be an object, got {other}"),
    }
}

fn transformer(format: CdrFormat, operation: Operation) -> RecordTransformer {
    RecordTransformer::new(TransformConfig {
        format,
        operation,
        target_index: "cdr".into(),
        ..TransformConfig::default()
    })
}

fn body_line(action: &Action) -> Value {
    let encoded = action.encode().expect("encode");
    let text = String::from_utf8(encoded).expect("utf8");
    let body = text.lines().nth(1).expect("body line");
    serde_json::from_str(body).expect("body json")
}

#[test]
fn v3_record_gets_index_timestamp_and_loses_metadata() {
    let t = transformer(CdrFormat::V3, Operation::Index);
    let action = t
        .transform(record(json!({
            "_id": "ABC",
            "url": "http://example.com",
            "timestamp_crawl": "2017-03-01T12:30:00Z",
            "metadata": {"lang": "en"},
        })))
        .expect("transform");

    assert_eq!(action.id(), "ABC");
    assert_eq!(action.target_index(), "cdr");
    assert_eq!(action.doc_type(), None);

    let payload = action.payload().expect("index carries a payload");
    assert!(!payload.contains_key("_id"));
    assert!(!payload.contains_key("metadata"));

    let indexed = payload["timestamp_index"].as_str().expect("timestamp_index");
    NaiveDateTime::parse_from_str(indexed, "%Y-%m-%dT%H:%M:%S%.fZ").expect("formatted timestamp");
}

#[test]
fn payload_keeps_record_field_order() {
    let t = transformer(CdrFormat::V3, Operation::Index);
    let action = t
        .transform(record(json!({
            "_id": "ABC",
            "version": 3.0,
            "url": "http://example.com",
            "objects": null,
            "timestamp_crawl": "2017-03-01T12:30:00Z",
            "team": "t",
        })))
        .expect("transform");

    let payload = action.payload().expect("payload");
    let keys: Vec<_> = payload.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["version", "url", "objects", "timestamp_crawl", "team", "timestamp_index"]
    );
    assert_eq!(payload["objects"], Value::Null);
}

#[test]
fn v2_millis_timestamp_is_formatted() {
    let t = transformer(CdrFormat::V2, Operation::Index);
    let action = t
        .transform(record(json!({
            "_id": "X",
            "timestamp": 1_488_371_400_123i64,
            "extracted_metadata": {},
            "url": "http://example.com",
        })))
        .expect("transform");

    let body = body_line(&action);
    assert_eq!(body["timestamp"], json!("2017-03-01T12:30:00.123000Z"));
    assert!(body.get("extracted_metadata").is_none());
    assert!(body.get("timestamp_index").is_none());
}

#[test]
fn wrong_format_is_fatal() {
    let t = transformer(CdrFormat::V3, Operation::Index);
    let err = t
        .transform(record(json!({"_id": "A", "timestamp": 1})))
        .unwrap_err();
    assert_eq!(err.to_string(), "this is not CDRv3, check --format");
}

#[test]
fn delete_has_no_payload() {
    let t = transformer(CdrFormat::V3, Operation::Delete);
    let action = t
        .transform(record(json!({"_id": "A", "timestamp_crawl": "t"})))
        .expect("transform");

    assert_eq!(action.operation(), Operation::Delete);
    assert!(action.payload().is_none());
    assert_eq!(action.encode().expect("encode").iter().filter(|b| **b == b'\n').count(), 1);
}

#[test]
fn reverse_domain_root_relocates_stored_objects() {
    let tmp = tempfile::tempdir().expect("create temp dir");
    std::fs::write(tmp.path().join("ABC.png"), b"pixels").expect("write object");

    let t = RecordTransformer::new(TransformConfig {
        format: CdrFormat::V3,
        target_index: "cdr".into(),
        reverse_domain_root: Some(tmp.path().to_path_buf()),
        ..TransformConfig::default()
    });

    let action = t
        .transform(record(json!({
            "_id": "A",
            "timestamp_crawl": "t",
            "objects": [{
                "obj_original_url": "http://www.example.com/a.png",
                "obj_stored_url": "ABC.png",
            }],
        })))
        .expect("transform");

    let body = body_line(&action);
    assert_eq!(body["objects"][0]["obj_stored_url"], json!("com/example/www/ABC"));
    assert!(tmp.path().join("com/example/www/ABC").exists());
}

#[test]
fn transform_all_tags_errors_with_record_position() {
    let t = transformer(CdrFormat::V3, Operation::Index);
    let records = vec![
        Ok(record(json!({"_id": "A", "timestamp_crawl": "t"}))),
        Ok(record(json!({"timestamp_crawl": "t"}))),
        Err(anyhow!("input.jl: line 3")),
    ];

    let out: Vec<_> = t.transform_all(records).collect();
    assert_eq!(out.len(), 3);
    assert_eq!(out[0].as_ref().expect("first ok").id(), "A");

    let err = out[1].as_ref().unwrap_err();
    assert_eq!(err.to_string(), "record 2");
    assert!(format!("{err:#}").contains("no `_id`"));

    assert_eq!(out[2].as_ref().unwrap_err().to_string(), "input.jl: line 3");
}
