use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Schema version of the documents being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CdrFormat {
    V2,
    #[default]
    V3,
}

impl CdrFormat {
    /// Field whose presence identifies a record as this schema version.
    pub fn marker_field(self) -> &'static str {
        match self {
            CdrFormat::V2 => "timestamp",
            CdrFormat::V3 => "timestamp_crawl",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CdrFormat::V2 => "CDRv2",
            CdrFormat::V3 => "CDRv3",
        }
    }
}

impl fmt::Display for CdrFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CdrFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cdrv2" | "v2" => Ok(CdrFormat::V2),
            "cdrv3" | "v3" => Ok(CdrFormat::V3),
            other => Err(format!("unknown format `{other}`, expected CDRv2 or CDRv3")),
        }
    }
}

/// ISO 8601 with a literal `Z`, e.g. `2017-03-01T12:30:00.000123Z`. The
/// fraction is left out on a whole second: `2017-03-01T12:30:00Z`.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    let seconds = dt.format("%Y-%m-%dT%H:%M:%S");
    match dt.timestamp_subsec_micros() {
        0 => format!("{seconds}Z"),
        micros => format!("{seconds}.{micros:06}Z"),
    }
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// CDRv2 stores crawl time as epoch milliseconds.
pub fn timestamp_from_millis(millis: i64) -> Option<String> {
    DateTime::from_timestamp_millis(millis).map(format_timestamp)
}

/// Document id: uppercase hex SHA-256 of `<url>-<timestamp_crawl>`.
pub fn format_id(url: &str, timestamp_crawl: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(b"-");
    hasher.update(timestamp_crawl.as_bytes());
    format!("{:X}", hasher.finalize())
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
