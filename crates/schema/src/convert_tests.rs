use super::*;
use crate::format::format_id;
use serde_json::json;

fn v2(value: Value) -> CdrV2Document {
    serde_json::from_value(value).expect("v2 fixture")
}

#[test]
fn converts_v2_document() {
    let doc = v2(json!({
        "_id": "OLD",
        "timestamp": 1_488_371_400_000i64,
        "version": 2.0,
        "url": "http://example.com",
        "crawler": "crawler",
        "team": "team",
        "raw_content": "<html></html>",
        "content_type": "text/html",
    }));

    let v3 = v2_to_v3(&doc).expect("convert");

    assert_eq!(v3.timestamp_crawl, "2017-03-01T12:30:00Z");
    assert_eq!(v3.id, format_id("http://example.com", &v3.timestamp_crawl));
    assert_ne!(v3.id, "OLD");
    assert_eq!(v3.fields["version"], json!(3.0));
    assert_eq!(v3.fields["raw_content"], json!("<html></html>"));
    assert_eq!(v3.fields["content_type"], json!("text/html"));
    assert_eq!(
        v3.fields["response_headers"],
        json!({"content-type": "text/html"})
    );
}

#[test]
fn rejects_other_versions_and_missing_fields() {
    let wrong_version = v2(json!({
        "_id": "A",
        "timestamp": 0,
        "version": 3.0,
        "url": "u",
        "crawler": "c",
        "team": "t",
    }));
    let err = v2_to_v3(&wrong_version).unwrap_err();
    assert!(err.to_string().contains("expected 2.0"), "{err}");

    let no_team = v2(json!({
        "_id": "A",
        "timestamp": 0,
        "version": 2.0,
        "url": "u",
        "crawler": "c",
    }));
    let err = v2_to_v3(&no_team).unwrap_err();
    assert!(err.to_string().contains("`team`"), "{err}");
}
