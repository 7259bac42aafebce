use std::time::Duration;

pub const PROGRAM_NAME: &str = "cdr";
pub const PROGRAM_LOG_LEVEL: &str = "CDR_LOG_LEVEL";

/// Actions per bulk request.
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// Byte limit for a single bulk request body.
/// 10 MB is the request size limit on hosted Elasticsearch (AWS).
pub const DEFAULT_MAX_CHUNK_BYTES: usize = 10 * (1 << 20);

/// Upload worker threads.
pub const DEFAULT_THREADS: usize = 4;

/// Messages per Kafka flush.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Hits per scroll page when downloading.
pub const DEFAULT_DOWNLOAD_CHUNK_SIZE: usize = 100;

pub const DEFAULT_ES_HOST: &str = "localhost:9200";

/// Bulk requests against a busy cluster can take minutes.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(600);

/// Minimum time between two progress lines.
pub const STATS_INTERVAL: Duration = Duration::from_secs(10);
