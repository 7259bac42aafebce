use std::{collections::BTreeMap, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use cdr_bulk::{StatsReporter, group_thousands};
use cdr_runtime::DEFAULT_DOWNLOAD_CHUNK_SIZE;
use cdr_sink::domain_query;
use cdr_source::JsonLinesWriter;
use clap::Args;
use log::info;

use super::{ElasticArgs, fatal};

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Output in .jl or .jl.gz format
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

pub fn run(args: DownloadArgs) -> ExitCode {
    match execute(args) {
        Ok(code) => code,
        Err(e) => fatal("download", e),
    }
}

fn execute(args: DownloadArgs) -> Result<ExitCode> {
    let client = args.elastic.connect()?;
    let query = domain_query(args.domain.as_deref());

    let total = client.count(&args.index, &query)?;
    info!("[download] {} items in {}", group_thousands(total as usize), args.index);

    let mut writer = JsonLinesWriter::create(&args.output)?;
    let mut stats = StatsReporter::default();
    let counts = BTreeMap::new();

    for record in client.scroll(&args.index, query, args.chunk_size)? {
        writer.write(&record?)?;
        if let Some(line) = stats.observe(writer.written(), &counts) {
            info!("{line}");
        }
    }

    let written = writer
        .finish()
        .with_context(|| format!("Failed to finish {}", args.output.display()))?;
    info!("{}", stats.finish(written, &counts));
    println!(
        "{} items downloaded to {}",
        group_thousands(written),
        args.output.display()
    );

    Ok(ExitCode::SUCCESS)
}
