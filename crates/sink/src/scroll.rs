use std::collections::VecDeque;

use anyhow::{Context, Result, bail};
use cdr_schema::{ID_FIELD, Record};
use log::{debug, warn};
use serde_json::{Value, json};

use crate::client::ElasticClient;

/// How long the cluster keeps a scroll context alive between pages.
const SCROLL_KEEPALIVE: &str = "5m";

/// Query selecting every document, or only those whose `url.domain` matches.
pub fn domain_query(domain: Option<&str>) -> Value {
    match domain {
        Some(domain) => json!({"bool": {"filter": [{"term": {"url.domain": domain}}]}}),
        None => json!({"match_all": {}}),
    }
}

/// Turn a search hit into a record: its `_source` with `_id` put back first.
pub fn hit_to_record(hit: Value) -> Result<Record> {
    let Value::Object(mut hit) = hit else {
        bail!("search hit is not an object");
    };

    let id = hit.remove(ID_FIELD).context("search hit has no `_id`")?;
    let source = match hit.remove("_source") {
        Some(Value::Object(source)) => source,
        Some(other) => bail!("`_source` of {id} is not an object: {other}"),
        None => bail!("search hit {id} has no `_source`"),
    };

    let mut record = Record::with_capacity(source.len() + 1);
    record.insert(ID_FIELD.to_string(), id);
    for (k, v) in source {
        if k != ID_FIELD {
            record.insert(k, v);
        }
    }
    Ok(record)
}

impl ElasticClient {
    pub fn count(&self, index: &str, query: &Value) -> Result<u64> {
        let resp = self.post_json(&format!("{index}/_count"), &json!({"query": query}), "count")?;
        resp.get("count")
            .and_then(Value::as_u64)
            .context("count response has no `count`")
    }

    /// Stream every document of `index` matching `query`, `page_size` hits
    /// per round trip.
    pub fn scroll(&self, index: &str, query: Value, page_size: usize) -> Result<ScrollHits<'_>> {
        let body = json!({
            "size": page_size.max(1),
            "sort": ["_doc"],
            "query": query,
        });
        let resp = self.post_json(
            &format!("{index}/_search?scroll={SCROLL_KEEPALIVE}"),
            &body,
            "search",
        )?;

        let mut hits = ScrollHits {
            client: self,
            scroll_id: None,
            buffer: VecDeque::new(),
            exhausted: false,
        };
        hits.absorb(resp)?;
        Ok(hits)
    }
}

/// Iterator over the hits of a scroll search. The scroll context is cleared
/// when the iterator is dropped.
pub struct ScrollHits<'a> {
    client: &'a ElasticClient,
    scroll_id: Option<String>,
    buffer: VecDeque<Value>,
    exhausted: bool,
}

impl ScrollHits<'_> {
    fn absorb(&mut self, resp: Value) -> Result<()> {
        if let Some(id) = resp.get("_scroll_id").and_then(Value::as_str) {
            self.scroll_id = Some(id.to_string());
        }

        let hits = resp
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .context("search response has no `hits.hits`")?;

        if hits.is_empty() {
            self.exhausted = true;
        }
        self.buffer.extend(hits.iter().cloned());
        Ok(())
    }

    fn next_page(&mut self) -> Result<()> {
        let Some(scroll_id) = self.scroll_id.clone() else {
            self.exhausted = true;
            return Ok(());
        };

        debug!("[elastic] fetching next scroll page");
        let resp = self.client.post_json(
            "_search/scroll",
            &json!({"scroll": SCROLL_KEEPALIVE, "scroll_id": scroll_id}),
            "scroll",
        )?;
        self.absorb(resp)
    }
}

impl Iterator for ScrollHits<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(hit) = self.buffer.pop_front() {
                return Some(hit_to_record(hit));
            }
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.next_page() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
    }
}

impl Drop for ScrollHits<'_> {
    fn drop(&mut self) {
        if let Some(scroll_id) = self.scroll_id.take() {
            let body = json!({"scroll_id": [scroll_id]});
            if let Err(e) = self.client.delete_json("_search/scroll", &body, "clear scroll") {
                warn!("[elastic] failed to clear scroll: {e:#}");
            }
        }
    }
}

#[cfg(test)]
#[path = "scroll_tests.rs"]
mod tests;
