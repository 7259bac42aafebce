use std::{collections::BTreeMap, path::PathBuf, process::ExitCode};

use anyhow::{Result, bail};
use cdr_bulk::StatsReporter;
use cdr_media::{FsMediaStore, HttpFetcher, MediaPipeline};
use cdr_runtime::{DEFAULT_THREADS, HTTP_TIMEOUT};
use cdr_schema::{CdrDocument, CdrFormat};
use cdr_source::{JsonLinesWriter, RecordSource, SourceOptions};
use clap::Args;
use log::info;

use super::fatal;

#[derive(Debug, Args)]
pub struct FetchMediaArgs {
    /// CDRv3 items in .jl or .jl.gz format
    pub input: PathBuf,

    /// Output in .jl or .jl.gz format
    pub output: PathBuf,

    /// Directory the fetched objects are stored in
    #[arg(long)]
    pub media_root: PathBuf,

    /// Concurrent downloads per item
    #[arg(long, default_value_t = DEFAULT_THREADS)]
    pub threads: usize,

    /// Input might be truncated; stop reading at its first bad line
    #[arg(long)]
    pub broken: bool,

    /// Process first N items
    #[arg(long)]
    pub limit: Option<usize>,
}

pub fn run(args: FetchMediaArgs) -> ExitCode {
    match execute(args) {
        Ok(code) => code,
        Err(e) => fatal("fetch-media", e),
    }
}

fn execute(args: FetchMediaArgs) -> Result<ExitCode> {
    let pipeline = MediaPipeline::new(
        HttpFetcher::new(HTTP_TIMEOUT)?,
        FsMediaStore::new(&args.media_root)?,
        args.threads,
    );

    let source = RecordSource::new(
        [&args.input],
        SourceOptions {
            tolerate_truncation: args.broken,
            limit: args.limit,
        },
    );
    let mut writer = JsonLinesWriter::create(&args.output)?;
    let mut stats = StatsReporter::default();
    let mut counts = BTreeMap::new();

    for record in source {
        let CdrDocument::V3(mut doc) = CdrDocument::from_record(CdrFormat::V3, record?)? else {
            bail!("fetch-media only handles CDRv3 items");
        };

        let requested = doc.objects.as_ref().map_or(0, Vec::len);
        let kept = pipeline.process(&mut doc);
        *counts.entry("stored".to_string()).or_insert(0) += kept;
        *counts.entry("dropped".to_string()).or_insert(0) += requested - kept;

        writer.write(&doc)?;
        if let Some(line) = stats.observe(writer.written(), &counts) {
            info!("{line}");
        }
    }

    let written = writer.finish()?;
    info!("{}", stats.finish(written, &counts));

    Ok(ExitCode::SUCCESS)
}
