use std::collections::BTreeMap;

use anyhow::{Context, Result, ensure};
use cdr_bulk::{ActionResult, Operation};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct BulkResponse {
    items: Vec<BTreeMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    status: u16,
    /// Missing on clusters older than 5.x.
    result: Option<String>,
    error: Option<Value>,
}

impl BulkItem {
    fn result_kind(&self) -> String {
        match &self.result {
            Some(result) => result.clone(),
            None => format!("status_{}", self.status),
        }
    }

    fn into_result(self, operation: Operation) -> ActionResult {
        let kind = self.result_kind();
        if (200..300).contains(&self.status) {
            return ActionResult::ok(operation, kind);
        }

        let detail = match self.error {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => format!("status {}", self.status),
        };
        ActionResult::failed(operation, kind, detail)
    }
}

/// Decode a `_bulk` response into one result per submitted operation.
pub fn parse_bulk_response(resp: Value, operations: &[Operation]) -> Result<Vec<ActionResult>> {
    let resp: BulkResponse =
        serde_json::from_value(resp).context("unexpected bulk response shape")?;

    ensure!(
        resp.items.len() == operations.len(),
        "bulk response has {} items for {} actions",
        resp.items.len(),
        operations.len()
    );

    resp.items
        .into_iter()
        .zip(operations)
        .map(|(mut entry, op)| {
            let item = entry
                .remove(op.as_str())
                .with_context(|| format!("bulk item has no `{op}` entry"))?;
            Ok(item.into_result(*op))
        })
        .collect()
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
