mod config;
pub mod logging;

pub use config::{
    DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_SIZE, DEFAULT_DOWNLOAD_CHUNK_SIZE, DEFAULT_ES_HOST,
    DEFAULT_MAX_CHUNK_BYTES, DEFAULT_THREADS, HTTP_TIMEOUT, PROGRAM_LOG_LEVEL,
    PROGRAM_NAME, STATS_INTERVAL,
};
