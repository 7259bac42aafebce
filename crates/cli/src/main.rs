use std::{path::PathBuf, process::ExitCode};

use clap::Parser;

mod commands;

use cdr_runtime::{PROGRAM_NAME, logging};
use commands::Command;

#[derive(Debug, Parser)]
#[command(
    name = PROGRAM_NAME,
    version,
    about = "Bulk tooling for CDR crawl dumps",
    propagate_version = true
)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace). Overrides CDR_LOG_LEVEL.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Append log lines to this file instead of stderr.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init_with(cli.log_level.as_deref(), cli.log_file.as_deref()) {
        eprintln!("[cdr] failed to set up logging: {e}");
        return ExitCode::from(2);
    }

    match cli.command {
        Command::Upload(args) => commands::upload::run(args),
        #[cfg(feature = "kafka")]
        Command::KafkaUpload(args) => commands::kafka_upload::run(args),
        Command::Download(args) => commands::download::run(args),
        Command::DownloadHashes(args) => commands::download_hashes::run(args),
        Command::V2ToV3(args) => commands::v2_to_v3::run(args),
        Command::FetchMedia(args) => commands::fetch_media::run(args),
    }
}
