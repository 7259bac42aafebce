pub mod download;
pub mod download_hashes;
pub mod fetch_media;
#[cfg(feature = "kafka")]
pub mod kafka_upload;
pub mod upload;
pub mod v2_to_v3;

use std::process::ExitCode;

use anyhow::{Error, Result};
use cdr_bulk::{Action, BoundedPipeline, BulkSink, PipelineConfig, PipelineState, StatsReporter};
use cdr_runtime::{DEFAULT_ES_HOST, HTTP_TIMEOUT};
use cdr_sink::{ElasticClient, ElasticConfig};
use clap::{Args, Subcommand};
use log::{error, info};

pub use download::DownloadArgs;
pub use download_hashes::DownloadHashesArgs;
pub use fetch_media::FetchMediaArgs;
#[cfg(feature = "kafka")]
pub use kafka_upload::KafkaUploadArgs;
pub use upload::UploadArgs;
pub use v2_to_v3::V2ToV3Args;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload CDR items to an Elasticsearch index.
    ///
    /// Example:
    ///   cdr upload items.jl.gz more.jl.gz cdr-index --threads 8
    Upload(UploadArgs),

    /// Publish CDR items to a Kafka topic.
    #[cfg(feature = "kafka")]
    KafkaUpload(KafkaUploadArgs),

    /// Download every item of an Elasticsearch index as JSON lines.
    Download(DownloadArgs),

    /// Write a CSV of crawl time, content SHA-1, team and url for every item
    /// of an Elasticsearch index.
    DownloadHashes(DownloadHashesArgs),

    /// Convert a CDRv2 dump to CDRv3.
    #[command(name = "v2-to-v3")]
    V2ToV3(V2ToV3Args),

    /// Download the media objects of CDRv3 items into a content-addressed store.
    FetchMedia(FetchMediaArgs),
}

/// Connection flags shared by the Elasticsearch commands.
#[derive(Debug, Clone, Args)]
pub struct ElasticArgs {
    /// ES host in host[:port] format
    #[arg(long, default_value = DEFAULT_ES_HOST)]
    pub host: String,

    /// HTTP Basic Auth user
    #[arg(long)]
    pub user: Option<String>,

    /// HTTP Basic Auth password
    #[arg(long)]
    pub password: Option<String>,
}

impl ElasticArgs {
    /// Connect and log the cluster info, failing early on a bad host.
    pub fn connect(&self) -> Result<ElasticClient> {
        let client = ElasticClient::new(&ElasticConfig {
            host: self.host.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            timeout: HTTP_TIMEOUT,
        })?;
        info!("{}", client.info()?);
        Ok(client)
    }
}

/// Log a fatal command error and map it to exit code 2.
pub(crate) fn fatal(command: &str, e: Error) -> ExitCode {
    error!("[{command}] {e:#}");
    eprintln!("[{command}] {e:#}");
    ExitCode::from(2)
}

/// Push `actions` through `sink`, reporting progress as results arrive.
///
/// The final stats line is logged even when the run aborts. Returns exit
/// code 1 when any action failed.
pub(crate) fn drive_upload<S, I>(sink: &S, config: PipelineConfig, actions: I) -> Result<ExitCode>
where
    S: BulkSink + ?Sized,
    I: IntoIterator<Item = Result<Action>>,
{
    let mut stats = StatsReporter::default();
    let mut state = PipelineState::default();

    let outcome = BoundedPipeline::new(sink, config).run(actions, &mut state, |_, state| {
        if let Some(line) = stats.observe(state.total_completed, &state.result_counts) {
            info!("{line}");
        }
    });

    info!("{}", stats.finish(state.total_completed, &state.result_counts));

    outcome?;
    Ok(exit_code(&state))
}

fn exit_code(state: &PipelineState) -> ExitCode {
    if state.failed {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
