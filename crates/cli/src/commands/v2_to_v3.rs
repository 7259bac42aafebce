use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result, bail, ensure};
use cdr_schema::{CdrDocument, CdrFormat, v2_to_v3};
use cdr_source::{JsonLinesWriter, RecordSource, SourceOptions};
use clap::Args;
use log::info;

use super::fatal;

#[derive(Debug, Args)]
pub struct V2ToV3Args {
    /// .jl or .jl.gz file in CDRv2 format
    pub input: PathBuf,

    /// Path to .jl or .jl.gz output in CDRv3 format
    pub output: PathBuf,

    /// Input might be truncated; stop reading at its first bad line
    #[arg(long)]
    pub broken: bool,
}

pub fn run(args: V2ToV3Args) -> ExitCode {
    match execute(args) {
        Ok(code) => code,
        Err(e) => fatal("v2-to-v3", e),
    }
}

fn execute(args: V2ToV3Args) -> Result<ExitCode> {
    ensure!(
        args.input != args.output,
        "input and output must be different files"
    );

    let source = RecordSource::new(
        [&args.input],
        SourceOptions {
            tolerate_truncation: args.broken,
            limit: None,
        },
    );
    let mut writer = JsonLinesWriter::create(&args.output)?;

    for (i, record) in source.enumerate() {
        let CdrDocument::V2(v2) = CdrDocument::from_record(CdrFormat::V2, record?)? else {
            bail!("record {} did not decode as CDRv2", i + 1);
        };
        let v3 = v2_to_v3(&v2).with_context(|| format!("record {} ({})", i + 1, v2.id))?;
        writer.write(&v3)?;
    }

    let written = writer.finish()?;
    info!("[v2-to-v3] converted {written} items to {}", args.output.display());

    Ok(ExitCode::SUCCESS)
}
