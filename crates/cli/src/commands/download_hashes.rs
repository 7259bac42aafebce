use std::{
    collections::BTreeMap,
    fs::File,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use cdr_bulk::{StatsReporter, group_thousands};
use cdr_runtime::DEFAULT_DOWNLOAD_CHUNK_SIZE;
use cdr_schema::{ID_FIELD, Record};
use cdr_sink::domain_query;
use clap::Args;
use log::info;
use serde_json::Value;
use sha1::{Digest, Sha1};
use url::Url;

use super::{ElasticArgs, fatal};

#[derive(Debug, Args)]
pub struct DownloadHashesArgs {
    /// Output in .csv format
    pub output: PathBuf,

    /// ES index name
    pub index: String,

    /// url.domain to filter
    #[arg(long)]
    pub domain: Option<String>,

    #[command(flatten)]
    pub elastic: ElasticArgs,

    /// Download chunk size
    #[arg(long, default_value_t = DEFAULT_DOWNLOAD_CHUNK_SIZE)]
    pub chunk_size: usize,
}

pub fn run(args: DownloadHashesArgs) -> ExitCode {
    match execute(args) {
        Ok(code) => code,
        Err(e) => fatal("download-hashes", e),
    }
}

fn execute(args: DownloadHashesArgs) -> Result<ExitCode> {
    let client = args.elastic.connect()?;
    let query = domain_query(args.domain.as_deref());

    let total = client.count(&args.index, &query)?;
    info!("[download-hashes] {} items in {}", group_thousands(total as usize), args.index);

    let mut writer = csv_writer(&args.output)?;
    let mut stats = StatsReporter::default();
    let counts = BTreeMap::new();
    let mut written = 0;

    for record in client.scroll(&args.index, query, args.chunk_size)? {
        writer.write_record(hash_row(&record?)?)?;
        written += 1;
        if let Some(line) = stats.observe(written, &counts) {
            info!("{line}");
        }
    }

    writer
        .flush()
        .with_context(|| format!("Failed to finish {}", args.output.display()))?;
    info!("{}", stats.finish(written, &counts));
    println!(
        "{} items downloaded to {}",
        group_thousands(written),
        args.output.display()
    );

    Ok(ExitCode::SUCCESS)
}

fn csv_writer(path: &Path) -> Result<csv::Writer<File>> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))
}

fn text_field<'a>(record: &'a Record, key: &str) -> Result<&'a str> {
    record.get(key).and_then(Value::as_str).with_context(|| {
        let id = record.get(ID_FIELD).unwrap_or(&Value::Null);
        format!("item {id} has no `{key}`")
    })
}

/// One CSV row: crawl time, SHA-1 of the raw content, team, url and the
/// canonical form of the url.
pub(crate) fn hash_row(record: &Record) -> Result<[String; 5]> {
    let url = text_field(record, "url")?;
    // A missing or null body hashes as the empty string.
    let raw_content = record.get("raw_content").and_then(Value::as_str).unwrap_or("");

    Ok([
        text_field(record, "timestamp_crawl")?.to_string(),
        format!("{:x}", Sha1::digest(raw_content.as_bytes())),
        text_field(record, "team")?.to_string(),
        url.to_string(),
        canonicalize_url(url),
    ])
}

/// Sort the query arguments and normalize scheme, host and path encoding.
/// The fragment is kept. Unparseable urls come back unchanged.
pub(crate) fn canonicalize_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };

    if url.query().is_some() {
        let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        pairs.sort();
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(&pairs);
        }
    }

    url.into()
}

#[cfg(test)]
#[path = "download_hashes_tests.rs"]
mod tests;
