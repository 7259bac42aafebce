use std::{path::PathBuf, process::ExitCode};

use anyhow::Result;
use cdr_bulk::{Operation, PipelineConfig, RecordTransformer, TransformConfig};
use cdr_runtime::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CHUNK_BYTES, DEFAULT_THREADS};
use cdr_schema::CdrFormat;
use cdr_sink::ElasticSink;
use cdr_source::{RecordSource, SourceOptions};
use clap::Args;
use log::info;

use super::{ElasticArgs, drive_upload, fatal};

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Inputs in .jl or .jl.gz format
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// ES index name
    pub index: String,

    /// ES type to use (omitted from requests unless set)
    #[arg(long = "type")]
    pub doc_type: Option<String>,

    /// ES operation type to use
    #[arg(long, default_value = "index")]
    pub op_type: Operation,

    /// Input might be truncated; stop reading a file at its first bad line
    #[arg(long)]
    pub broken: bool,

    #[command(flatten)]
    pub elastic: ElasticArgs,

    /// Upload chunk size (actions per bulk request)
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Byte limit for a single bulk request
    #[arg(long, default_value_t = DEFAULT_MAX_CHUNK_BYTES)]
    pub max_chunk_bytes: usize,

    /// Number of upload threads
    #[arg(long, default_value_t = DEFAULT_THREADS)]
    pub threads: usize,

    /// Index first N items
    #[arg(long)]
    pub limit: Option<usize>,

    /// Input format: CDRv2 or CDRv3
    #[arg(long, default_value = "CDRv3")]
    pub format: CdrFormat,

    /// Abort once more than this many bulk requests failed as a whole
    #[arg(long)]
    pub max_chunk_errors: Option<usize>,

    /// Move media into a reversed-domain layout under --media-root
    #[arg(long, requires = "media_root")]
    pub reverse_domain_storage: bool,

    /// Root of the stored media
    #[arg(long)]
    pub media_root: Option<PathBuf>,
}

impl UploadArgs {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            threads: self.threads,
            chunk_size: self.chunk_size,
            max_chunk_bytes: self.max_chunk_bytes,
            max_chunk_errors: self.max_chunk_errors,
        }
    }

    fn transform_config(&self) -> TransformConfig {
        TransformConfig {
            format: self.format,
            operation: self.op_type,
            target_index: self.index.clone(),
            doc_type: self.doc_type.clone(),
            reverse_domain_root: if self.reverse_domain_storage {
                self.media_root.clone()
            } else {
                None
            },
        }
    }
}

pub fn run(args: UploadArgs) -> ExitCode {
    match execute(args) {
        Ok(code) => code,
        Err(e) => fatal("upload", e),
    }
}

fn execute(args: UploadArgs) -> Result<ExitCode> {
    let config = args.pipeline_config();
    config.validate()?;

    let sink = ElasticSink::new(args.elastic.connect()?);
    let transformer = RecordTransformer::new(args.transform_config());
    let source = RecordSource::new(
        &args.inputs,
        SourceOptions {
            tolerate_truncation: args.broken,
            limit: args.limit,
        },
    );

    info!(
        "[upload] {} {} into {} ({} threads, {} actions per request)",
        args.op_type,
        args.format,
        args.index,
        config.threads,
        config.chunk_size
    );

    drive_upload(&sink, config, transformer.transform_all(source))
}

#[cfg(test)]
#[path = "upload_tests.rs"]
mod tests;
