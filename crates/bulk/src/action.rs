use std::{fmt, str::FromStr};

use serde::Serialize;
use serde_json::{Map, Value};

/// Result kind recorded for every action of a chunk the sink failed as a whole.
pub const EXCEPTION_RESULT: &str = "exception";

/// Results that make a delete a no-op rather than a failure.
const NOT_FOUND_RESULTS: &[&str] = &["not_found", "status_404"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Operation {
    #[default]
    Index,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Index => "index",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "index" => Ok(Operation::Index),
            "create" => Ok(Operation::Create),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            other => Err(format!(
                "unknown operation `{other}`, expected index, create, update or delete"
            )),
        }
    }
}

/// One write against the sink.
///
/// Delete actions never carry a payload; every other operation always does.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    operation: Operation,
    target_index: String,
    doc_type: Option<String>,
    id: String,
    payload: Option<Map<String, Value>>,
}

#[derive(Serialize)]
struct ActionMeta<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_type", skip_serializing_if = "Option::is_none")]
    doc_type: Option<&'a str>,
    #[serde(rename = "_id")]
    id: &'a str,
}

#[derive(Serialize)]
struct UpdateBody<'a> {
    doc: &'a Map<String, Value>,
}

impl Action {
    /// Build an action; `payload` is discarded for deletes.
    pub fn new(
        operation: Operation,
        target_index: impl Into<String>,
        doc_type: Option<String>,
        id: impl Into<String>,
        payload: Map<String, Value>,
    ) -> Self {
        let payload = match operation {
            Operation::Delete => None,
            _ => Some(payload),
        };

        Self {
            operation,
            target_index: target_index.into(),
            doc_type,
            id: id.into(),
            payload,
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn target_index(&self) -> &str {
        &self.target_index
    }

    pub fn doc_type(&self) -> Option<&str> {
        self.doc_type.as_deref()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn payload(&self) -> Option<&Map<String, Value>> {
        self.payload.as_ref()
    }

    /// Append the bulk NDJSON encoding of this action to `buf`: a header line
    /// and, unless this is a delete, a body line. Updates send a partial `doc`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) -> serde_json::Result<()> {
        let meta = ActionMeta {
            index: &self.target_index,
            doc_type: self.doc_type.as_deref(),
            id: &self.id,
        };

        let mut header = Map::new();
        header.insert(self.operation.as_str().to_string(), serde_json::to_value(meta)?);
        serde_json::to_writer(&mut *buf, &header)?;
        buf.push(b'\n');

        match (&self.payload, self.operation) {
            (Some(payload), Operation::Update) => {
                serde_json::to_writer(&mut *buf, &UpdateBody { doc: payload })?;
                buf.push(b'\n');
            }
            (Some(payload), _) => {
                serde_json::to_writer(&mut *buf, payload)?;
                buf.push(b'\n');
            }
            (None, _) => {}
        }

        Ok(())
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf)?;
        Ok(buf)
    }
}

/// Outcome of one action, positionally matched with the action that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub operation: Operation,
    pub success: bool,
    /// Result kind reported by the sink, e.g. `created`, `updated`, `not_found`.
    pub result: String,
    /// Error detail for failed actions.
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok(operation: Operation, result: impl Into<String>) -> Self {
        Self {
            operation,
            success: true,
            result: result.into(),
            error: None,
        }
    }

    pub fn failed(operation: Operation, result: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            operation,
            success: false,
            result: result.into(),
            error: Some(error.into()),
        }
    }

    /// Whether this result should fail the run. Deleting a missing document
    /// is not a failure.
    pub fn is_failure(&self) -> bool {
        if self.success {
            return false;
        }
        !(self.operation == Operation::Delete && NOT_FOUND_RESULTS.contains(&self.result.as_str()))
    }
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
