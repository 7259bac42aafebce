use anyhow::{Context, Result, ensure};
use serde_json::{Map, Value};

use crate::{
    document::{CdrV2Document, CdrV3Document, V2Timestamp},
    format::timestamp_from_millis,
};

fn string_field<'a>(doc: &'a CdrV2Document, name: &str) -> Result<&'a str> {
    doc.fields
        .get(name)
        .and_then(Value::as_str)
        .with_context(|| format!("CDRv2 document {} has no string `{name}`", doc.id))
}

/// Convert a CDRv2 document into CDRv3.
///
/// The id is recomputed from the url and the converted crawl timestamp, so it
/// will differ from the v2 id.
pub fn v2_to_v3(doc: &CdrV2Document) -> Result<CdrV3Document> {
    let version = doc.fields.get("version").and_then(Value::as_f64);
    ensure!(
        version == Some(2.0),
        "document {} has version {:?}, expected 2.0",
        doc.id,
        version
    );

    let timestamp_crawl = match &doc.timestamp {
        V2Timestamp::Millis(millis) => timestamp_from_millis(*millis)
            .with_context(|| format!("timestamp {millis} is out of range"))?,
        V2Timestamp::Formatted(ts) => ts.clone(),
    };

    let url = string_field(doc, "url")?;
    let content_type = doc.fields.get("content_type").cloned().unwrap_or(Value::Null);

    let mut headers = Map::new();
    headers.insert("content-type".into(), content_type.clone());

    let v3 = CdrV3Document::new(
        url,
        string_field(doc, "crawler")?,
        string_field(doc, "team")?,
        timestamp_crawl,
    )
    .with_field(
        "raw_content",
        doc.fields.get("raw_content").cloned().unwrap_or(Value::Null),
    )
    .with_field("content_type", content_type)
    .with_field("response_headers", headers);

    Ok(v3)
}

#[cfg(test)]
#[path = "convert_tests.rs"]
mod tests;
