use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Map, Value};

/// A downloaded binary object.
#[derive(Debug, Clone, Default)]
pub struct FetchedObject {
    pub url: String,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    /// Lowercase header names; repeated headers are joined with ", ".
    pub headers: Map<String, Value>,
}

/// Downloads a single object. Implementations must be usable from several
/// threads at once.
pub trait Fetcher: Sync {
    fn fetch(&self, url: &str) -> Result<FetchedObject>;
}

/// Blocking HTTP fetcher.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedObject> {
        let resp = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("GET {url} failed"))?
            .error_for_status()
            .with_context(|| format!("GET {url} returned an error status"))?;

        let mut headers = Map::new();
        for (name, value) in resp.headers() {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            match headers.get_mut(name.as_str()) {
                Some(Value::String(existing)) => {
                    existing.push_str(", ");
                    existing.push_str(&value);
                }
                _ => {
                    headers.insert(name.as_str().to_string(), Value::String(value));
                }
            }
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

        let body = resp
            .bytes()
            .with_context(|| format!("failed to read body of {url}"))?
            .to_vec();

        Ok(FetchedObject {
            url: url.to_string(),
            body,
            content_type,
            headers,
        })
    }
}
