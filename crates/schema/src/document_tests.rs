use super::*;
use serde_json::json;

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture must be an object, got {other}"),
    }
}

#[test]
fn from_record_rejects_wrong_schema_marker() {
    let cases = [
        (CdrFormat::V3, json!({"_id": "A", "timestamp": 1}), "CDRv3"),
        (CdrFormat::V2, json!({"_id": "A", "timestamp_crawl": "t"}), "CDRv2"),
    ];

    for (format, value, name) in cases {
        let err = CdrDocument::from_record(format, record(value)).unwrap_err();
        assert_eq!(err.to_string(), format!("this is not {name}, check --format"));
    }
}

#[test]
fn from_record_requires_string_id() {
    let missing = CdrDocument::from_record(
        CdrFormat::V3,
        record(json!({"timestamp_crawl": "t", "url": "http://a"})),
    )
    .unwrap_err();
    assert!(missing.to_string().contains("no `_id`"), "{missing}");

    let numeric = CdrDocument::from_record(
        CdrFormat::V3,
        record(json!({"_id": 7, "timestamp_crawl": "t"})),
    )
    .unwrap_err();
    assert!(numeric.to_string().contains("must be a string"), "{numeric}");
}

#[test]
fn v3_into_parts_drops_id_and_metadata() {
    let doc = CdrDocument::from_record(
        CdrFormat::V3,
        record(json!({
            "_id": "ABC",
            "url": "http://example.com",
            "timestamp_crawl": "2017-03-01T12:30:00.000000Z",
            "metadata": {"x": 1},
            "team": "t",
        })),
    )
    .expect("valid v3");

    assert_eq!(doc.id(), "ABC");

    let (id, payload) = doc.into_parts().expect("into_parts");
    assert_eq!(id, "ABC");
    assert!(!payload.contains_key("_id"));
    assert!(!payload.contains_key("metadata"));
    assert_eq!(payload["url"], json!("http://example.com"));
    assert_eq!(payload["team"], json!("t"));
    assert_eq!(payload["timestamp_crawl"], json!("2017-03-01T12:30:00.000000Z"));
}

#[test]
fn v2_into_parts_drops_extracted_metadata_and_normalizes_millis() {
    let doc = CdrDocument::from_record(
        CdrFormat::V2,
        record(json!({
            "_id": "X",
            "timestamp": 1_488_371_400_123i64,
            "extracted_metadata": {"a": "b"},
            "url": "http://example.com",
        })),
    )
    .expect("valid v2");

    let CdrDocument::V2(mut v2) = doc else {
        panic!("expected v2 document");
    };
    assert_eq!(v2.timestamp, V2Timestamp::Millis(1_488_371_400_123));

    v2.normalize_timestamp().expect("normalize");
    assert_eq!(
        v2.timestamp,
        V2Timestamp::Formatted("2017-03-01T12:30:00.123000Z".into())
    );

    let (_, payload) = CdrDocument::V2(v2).into_parts().expect("into_parts");
    assert!(!payload.contains_key("extracted_metadata"));
    assert_eq!(payload["timestamp"], json!("2017-03-01T12:30:00.123000Z"));
}

#[test]
fn objects_accept_urls_and_stored_entries() {
    let doc: CdrV3Document = serde_json::from_value(json!({
        "_id": "A",
        "timestamp_crawl": "t",
        "objects": [
            "http://example.com/1.png",
            {
                "obj_original_url": "http://example.com/2.png",
                "obj_stored_url": "ABCD.png",
                "content_type": "image/png",
            },
        ],
    }))
    .expect("decode");

    let objects = doc.objects.expect("objects present");
    assert_eq!(objects.len(), 2);
    assert_eq!(objects[0], ObjectRef::Url("http://example.com/1.png".into()));
    match &objects[1] {
        ObjectRef::Stored(obj) => {
            assert_eq!(obj.obj_stored_url, "ABCD.png");
            assert_eq!(obj.content_type.as_deref(), Some("image/png"));
        }
        other => panic!("expected stored object, got {other:?}"),
    }
}

#[test]
fn new_v3_document_derives_id_from_url_and_timestamp() {
    let ts = "2017-03-01T12:30:00.000000Z".to_string();
    let doc = CdrV3Document::new("http://example.com", "crawler", "team", ts.clone())
        .with_field("raw_content", "a body");

    assert_eq!(doc.id, format_id("http://example.com", &ts));
    assert_eq!(doc.url(), Some("http://example.com"));

    let value = serde_json::to_value(&doc).expect("serialize");
    assert_eq!(value["version"], json!(3.0));
    assert_eq!(value["raw_content"], json!("a body"));
    assert!(value.get("objects").is_none());
    assert!(value.get("timestamp_index").is_none());
}

#[test]
fn field_order_follows_the_record() {
    let raw = record(json!({
        "_id": "ABC",
        "url": "http://example.com",
        "objects": null,
        "team": "t",
        "timestamp_crawl": "2017-03-01T12:30:00Z",
        "metadata": {"x": 1},
    }));
    let order = FieldOrder::of(&raw);

    let CdrDocument::V3(mut doc) = CdrDocument::from_record(CdrFormat::V3, raw).expect("v3") else {
        panic!("expected v3");
    };
    doc.timestamp_index = Some("2017-03-02T00:00:00Z".into());
    let (_, payload) = CdrDocument::V3(doc).into_parts().expect("into_parts");

    // The typed document alone moves its own fields first and skips the null.
    let typed: Vec<_> = payload.keys().cloned().collect();
    assert_eq!(typed[0], "timestamp_crawl");
    assert!(!payload.contains_key("objects"));

    let payload = order.apply(payload);
    let keys: Vec<_> = payload.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["url", "objects", "team", "timestamp_crawl", "timestamp_index"]
    );
    assert_eq!(payload["objects"], Value::Null);
}

#[test]
fn field_order_leaves_present_objects_alone() {
    let raw = record(json!({"b": 1, "objects": ["http://a/1.png"], "a": 2}));
    let order = FieldOrder::of(&raw);

    let mut payload = Map::new();
    payload.insert("a".into(), json!(2));
    payload.insert("objects".into(), json!([]));
    payload.insert("b".into(), json!(1));

    let keys: Vec<_> = order.apply(payload).keys().cloned().collect();
    assert_eq!(keys, vec!["b", "objects", "a"]);
}
