use anyhow::Result;
use cdr_bulk::{ActionResult, BulkSink, Chunk};

use crate::client::ElasticClient;

/// Writes chunks to Elasticsearch through the `_bulk` endpoint.
pub struct ElasticSink {
    client: ElasticClient,
}

impl ElasticSink {
    pub fn new(client: ElasticClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ElasticClient {
        &self.client
    }
}

impl BulkSink for ElasticSink {
    fn submit(&self, chunk: &Chunk) -> Result<Vec<ActionResult>> {
        if chunk.is_empty() {
            return Ok(Vec::new());
        }
        self.client.bulk(chunk.body(), &chunk.operations())
    }
}

#[cfg(test)]
#[path = "elastic_tests.rs"]
mod tests;
