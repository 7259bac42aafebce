use std::time::Duration;

use anyhow::{Context, Result, bail, ensure};
use cdr_bulk::{ActionResult, Operation};
use cdr_runtime::{DEFAULT_ES_HOST, HTTP_TIMEOUT};
use log::debug;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde_json::Value;
use url::Url;

use crate::response::parse_bulk_response;

const DEFAULT_PORT: u16 = 9200;

#[derive(Debug, Clone)]
pub struct ElasticConfig {
    /// `host[:port]` or a full URL.
    pub host: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_ES_HOST.to_string(),
            user: None,
            password: None,
            timeout: HTTP_TIMEOUT,
        }
    }
}

/// Parse `host[:port]` into a base URL. A bare host gets `http://` and the
/// default Elasticsearch port.
pub fn parse_host(host: &str) -> Result<Url> {
    let host = host.trim();
    ensure!(!host.is_empty(), "empty Elasticsearch host");

    let (with_scheme, needs_port) = if host.contains("://") {
        (host.to_string(), false)
    } else {
        let authority = host.split('/').next().unwrap_or(host);
        let has_port = authority
            .rsplit_once(':')
            .is_some_and(|(_, port)| port.parse::<u16>().is_ok());
        (format!("http://{host}"), !has_port)
    };

    let mut url = Url::parse(&with_scheme).with_context(|| format!("invalid host `{host}`"))?;
    ensure!(url.host_str().is_some(), "host `{host}` has no hostname");

    if needs_port {
        url.set_port(Some(DEFAULT_PORT))
            .map_err(|_| anyhow::anyhow!("cannot set port on `{host}`"))?;
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

/// Blocking client for the handful of Elasticsearch endpoints the tools use.
#[derive(Clone)]
pub struct ElasticClient {
    client: Client,
    base: Url,
    user: Option<String>,
    password: Option<String>,
}

impl ElasticClient {
    pub fn new(config: &ElasticConfig) -> Result<Self> {
        let base = parse_host(&config.host)?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build Elasticsearch HTTP client")?;

        Ok(Self {
            client,
            base,
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("invalid endpoint `{path}`"))
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        if self.user.is_some() || self.password.is_some() {
            req.basic_auth(self.user.as_deref().unwrap_or(""), self.password.as_deref())
        } else {
            req
        }
    }

    /// Send `req` and fail on a non-success status, keeping the response body
    /// in the error.
    pub(crate) fn send(&self, req: RequestBuilder, what: &str) -> Result<Response> {
        let resp = self
            .authed(req)
            .send()
            .with_context(|| format!("{what} request to {} failed", self.base))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("{what} request failed ({status}): {body}");
        }
        Ok(resp)
    }

    pub(crate) fn post_json(&self, path: &str, body: &Value, what: &str) -> Result<Value> {
        let url = self.endpoint(path)?;
        let resp = self.send(self.client.post(url).json(body), what)?;
        resp.json()
            .with_context(|| format!("failed to parse {what} response"))
    }

    pub(crate) fn delete_json(&self, path: &str, body: &Value, what: &str) -> Result<()> {
        let url = self.endpoint(path)?;
        self.send(self.client.delete(url).json(body), what)?;
        Ok(())
    }

    /// Cluster name and version, as reported by the root endpoint.
    pub fn info(&self) -> Result<Value> {
        let url = self.endpoint("")?;
        let resp = self.send(self.client.get(url), "info")?;
        resp.json().context("failed to parse cluster info")
    }

    /// Post one bulk body and map the per-item outcome onto `operations`.
    pub fn bulk(&self, body: &[u8], operations: &[Operation]) -> Result<Vec<ActionResult>> {
        let url = self.endpoint("_bulk")?;
        debug!("[elastic] bulk: {} actions, {} bytes", operations.len(), body.len());

        let req = self
            .client
            .post(url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/x-ndjson"))
            .body(body.to_vec());

        let resp: Value = self
            .send(req, "bulk")?
            .json()
            .context("failed to parse bulk response")?;

        parse_bulk_response(resp, operations)
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
