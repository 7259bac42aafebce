use std::{path::PathBuf, process::ExitCode, time::Duration};

use anyhow::Result;
use cdr_bulk::{Operation, PipelineConfig, RecordTransformer, TransformConfig};
use cdr_runtime::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_CHUNK_BYTES};
use cdr_schema::CdrFormat;
use cdr_sink::{KafkaConfig, KafkaSink};
use cdr_source::{RecordSource, SourceOptions};
use clap::Args;
use log::info;

use super::{drive_upload, fatal};

const FLUSH_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Args)]
pub struct KafkaUploadArgs {
    /// Inputs in .jl or .jl.gz format
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Kafka topic
    pub topic: String,

    /// Brokers (comma-separated), including port
    #[arg(long)]
    pub brokers: Option<String>,

    /// Upload first N items
    #[arg(long)]
    pub limit: Option<usize>,

    /// Input might be truncated; stop reading a file at its first bad line
    #[arg(long)]
    pub broken: bool,

    /// Directory with ca-cert.pem, client-cert.pem and client-key.pem
    #[arg(long)]
    pub ssl_keys_path: Option<PathBuf>,

    /// Messages per flush
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Number of producer threads
    #[arg(long, default_value_t = 1)]
    pub threads: usize,
}

pub fn run(args: KafkaUploadArgs) -> ExitCode {
    match execute(args) {
        Ok(code) => code,
        Err(e) => fatal("kafka-upload", e),
    }
}

fn execute(args: KafkaUploadArgs) -> Result<ExitCode> {
    let config = PipelineConfig {
        threads: args.threads,
        chunk_size: args.batch_size,
        max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
        max_chunk_errors: None,
    };
    config.validate()?;

    let sink = KafkaSink::new(KafkaConfig {
        topic: args.topic.clone(),
        brokers: args.brokers.clone(),
        ssl_keys_path: args.ssl_keys_path.clone(),
        flush_timeout: FLUSH_TIMEOUT,
    })?;

    let transformer = RecordTransformer::new(TransformConfig {
        format: CdrFormat::V3,
        operation: Operation::Index,
        target_index: args.topic.clone(),
        ..TransformConfig::default()
    });
    let source = RecordSource::new(
        &args.inputs,
        SourceOptions {
            tolerate_truncation: args.broken,
            limit: args.limit,
        },
    );

    info!("[kafka-upload] publishing to {}", args.topic);

    drive_upload(&sink, config, transformer.transform_all(source))
}
