use std::path::PathBuf;

use anyhow::{Context, Result};
use cdr_media::relocate_objects;
use cdr_schema::{CdrDocument, CdrFormat, FieldOrder, Record, now_timestamp};

use crate::action::{Action, Operation};

#[derive(Debug, Clone, Default)]
pub struct TransformConfig {
    pub format: CdrFormat,
    pub operation: Operation,
    pub target_index: String,
    pub doc_type: Option<String>,
    /// Relocate stored media into the reversed-domain layout under this root.
    pub reverse_domain_root: Option<PathBuf>,
}

/// Turns raw records into sink actions.
#[derive(Debug, Clone)]
pub struct RecordTransformer {
    config: TransformConfig,
}

impl RecordTransformer {
    pub fn new(config: TransformConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Payload fields keep the record's order; `timestamp_index` goes last
    /// when the record did not have one.
    pub fn transform(&self, record: Record) -> Result<Action> {
        let order = FieldOrder::of(&record);
        let mut doc = CdrDocument::from_record(self.config.format, record)?;

        match &mut doc {
            CdrDocument::V3(v3) => {
                v3.timestamp_index = Some(now_timestamp());
                if let Some(root) = &self.config.reverse_domain_root {
                    relocate_objects(v3, root)
                        .with_context(|| format!("Failed to relocate media of {}", v3.id))?;
                }
            }
            CdrDocument::V2(v2) => v2.normalize_timestamp()?,
        }

        let (id, payload) = doc.into_parts()?;

        Ok(Action::new(
            self.config.operation,
            self.config.target_index.as_str(),
            self.config.doc_type.clone(),
            id,
            order.apply(payload),
        ))
    }

    /// Lazily transform a record stream. Errors from the stream pass through
    /// untouched; transform errors are tagged with the record's position.
    pub fn transform_all<'a, I>(&'a self, records: I) -> impl Iterator<Item = Result<Action>> + 'a
    where
        I: IntoIterator<Item = Result<Record>>,
        I::IntoIter: 'a,
    {
        records.into_iter().enumerate().map(move |(i, record)| {
            let record = record?;
            self.transform(record)
                .with_context(|| format!("record {}", i + 1))
        })
    }
}

#[cfg(test)]
#[path = "transform_tests.rs"]
mod tests;
