use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::format::{CdrFormat, format_id, now_timestamp, timestamp_from_millis};

/// One raw crawled document as read from disk, field order preserved.
pub type Record = Map<String, Value>;

/// Field holding the document identifier.
pub const ID_FIELD: &str = "_id";

const OBJECTS_FIELD: &str = "objects";

/// Key order of a raw record, used to lay a typed document's payload out the
/// way the record was.
#[derive(Debug, Clone, Default)]
pub struct FieldOrder {
    keys: Vec<String>,
    null_objects: bool,
}

impl FieldOrder {
    pub fn of(record: &Record) -> Self {
        Self {
            keys: record.keys().cloned().collect(),
            null_objects: matches!(record.get(OBJECTS_FIELD), Some(Value::Null)),
        }
    }

    /// Reorder `payload` to follow the record. Fields the record did not have
    /// go last, in payload order. An `objects: null` is put back in place.
    pub fn apply(&self, mut payload: Map<String, Value>) -> Map<String, Value> {
        let mut ordered = Map::with_capacity(payload.len() + 1);
        for key in &self.keys {
            if let Some(value) = payload.remove(key) {
                ordered.insert(key.clone(), value);
            } else if key == OBJECTS_FIELD && self.null_objects {
                ordered.insert(key.clone(), Value::Null);
            }
        }
        ordered.extend(payload);
        ordered
    }
}

/// A binary object referenced by a CDRv3 document.
///
/// Crawlers emit bare URLs; the media pipeline replaces them with stored objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectRef {
    Url(String),
    Stored(MediaObject),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaObject {
    /// Where the object was downloaded from.
    pub obj_original_url: String,
    /// Content-addressed key of the stored copy, relative to the media root.
    pub obj_stored_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_crawl: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub response_headers: Map<String, Value>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl MediaObject {
    /// Stored object fetched just now.
    pub fn new(
        original_url: impl Into<String>,
        stored_url: impl Into<String>,
        content_type: Option<String>,
        response_headers: Map<String, Value>,
    ) -> Self {
        Self {
            obj_original_url: original_url.into(),
            obj_stored_url: stored_url.into(),
            content_type,
            timestamp_crawl: Some(now_timestamp()),
            response_headers,
            fields: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdrV3Document {
    #[serde(rename = "_id")]
    pub id: String,
    pub timestamp_crawl: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<ObjectRef>>,
    /// Not part of the CDRv3 schema; read but never written.
    #[serde(default, skip_serializing)]
    pub metadata: Option<Value>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl CdrV3Document {
    /// A fresh version 3.0 document whose id is derived from `url` and the crawl time.
    pub fn new(url: &str, crawler: &str, team: &str, timestamp_crawl: String) -> Self {
        let mut fields = Map::new();
        fields.insert("crawler".into(), Value::from(crawler));
        fields.insert("team".into(), Value::from(team));
        fields.insert("url".into(), Value::from(url));
        fields.insert("version".into(), Value::from(3.0));

        Self {
            id: format_id(url, &timestamp_crawl),
            timestamp_crawl,
            timestamp_index: None,
            objects: None,
            metadata: None,
            fields,
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn url(&self) -> Option<&str> {
        self.fields.get("url").and_then(Value::as_str)
    }
}

/// CDRv2 crawl time: epoch milliseconds as written by old crawlers, or already formatted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum V2Timestamp {
    Millis(i64),
    Formatted(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdrV2Document {
    #[serde(rename = "_id")]
    pub id: String,
    pub timestamp: V2Timestamp,
    /// Not accepted by the CDRv2 index mapping; read but never written.
    #[serde(default, skip_serializing)]
    pub extracted_metadata: Option<Value>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl CdrV2Document {
    /// Rewrite an epoch-millis timestamp into the formatted representation.
    pub fn normalize_timestamp(&mut self) -> Result<()> {
        if let V2Timestamp::Millis(millis) = self.timestamp {
            let formatted = timestamp_from_millis(millis)
                .with_context(|| format!("timestamp {millis} is out of range"))?;
            self.timestamp = V2Timestamp::Formatted(formatted);
        }
        Ok(())
    }
}

/// A record checked against one schema version.
#[derive(Debug, Clone, PartialEq)]
pub enum CdrDocument {
    V2(CdrV2Document),
    V3(CdrV3Document),
}

impl CdrDocument {
    /// Check the schema marker and identifier of `record`, then decode it as `format`.
    pub fn from_record(format: CdrFormat, record: Record) -> Result<Self> {
        if !record.contains_key(format.marker_field()) {
            bail!("this is not {format}, check --format");
        }

        match record.get(ID_FIELD) {
            Some(Value::String(_)) => {}
            Some(other) => bail!("`{ID_FIELD}` must be a string, got {other}"),
            None => bail!("record has no `{ID_FIELD}` field"),
        }

        let value = Value::Object(record);
        let doc = match format {
            CdrFormat::V2 => CdrDocument::V2(
                serde_json::from_value(value).context("record does not match CDRv2")?,
            ),
            CdrFormat::V3 => CdrDocument::V3(
                serde_json::from_value(value).context("record does not match CDRv3")?,
            ),
        };

        Ok(doc)
    }

    pub fn id(&self) -> &str {
        match self {
            CdrDocument::V2(doc) => &doc.id,
            CdrDocument::V3(doc) => &doc.id,
        }
    }

    /// Split into the identifier and the payload without it.
    ///
    /// Schema-incompatible fields are dropped here.
    pub fn into_parts(self) -> Result<(String, Map<String, Value>)> {
        let (id, value) = match self {
            CdrDocument::V2(doc) => (doc.id.clone(), serde_json::to_value(doc)?),
            CdrDocument::V3(doc) => (doc.id.clone(), serde_json::to_value(doc)?),
        };

        let Value::Object(mut payload) = value else {
            bail!("document {id} did not serialize to an object");
        };
        payload.remove(ID_FIELD);

        Ok((id, payload))
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
