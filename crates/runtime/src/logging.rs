use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::Path,
    sync::{Mutex, OnceLock},
};

use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::config::PROGRAM_LOG_LEVEL;

enum LogTarget {
    Stderr,
    File(Mutex<File>),
}

pub struct Logger {
    level: Level,
    target: LogTarget,
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            let msg = format!(
                "{} {} [{}] {}",
                timestamp,
                record.level(),
                record.target(),
                record.args()
            );

            match &self.target {
                LogTarget::Stderr => {
                    eprintln!("{msg}")
                }
                LogTarget::File(file) => {
                    // A poisoned lock only means another thread panicked mid-write.
                    let mut file = file.lock().unwrap_or_else(|e| e.into_inner());
                    let _ = writeln!(file, "{msg}");
                }
            }
        }
    }

    fn flush(&self) {
        if let LogTarget::File(file) = &self.target {
            let mut file = file.lock().unwrap_or_else(|e| e.into_inner());
            let _ = file.flush();
        }
    }
}

/// Parse a level name such as `info` or `DEBUG`. `off` and unknown names yield `None`.
fn parse_level(name: &str) -> Option<Level> {
    name.parse::<LevelFilter>()
        .ok()
        .and_then(|filter| filter.to_level())
}

fn get_level_from_env() -> Option<Level> {
    std::env::var(PROGRAM_LOG_LEVEL)
        .ok()
        .and_then(|s| parse_level(&s))
}

/// Resolve the effective level: explicit flag, then environment, then `Info`.
pub fn resolve_level(flag: Option<&str>) -> Level {
    flag.and_then(parse_level)
        .or_else(get_level_from_env)
        .unwrap_or(Level::Info)
}

/// Install a logger with an optional level override, writing to `log_file`
/// (append mode) when given and to stderr otherwise.
pub fn init_with(level: Option<&str>, log_file: Option<&Path>) -> io::Result<()> {
    let target = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            LogTarget::File(Mutex::new(file))
        }
        None => LogTarget::Stderr,
    };

    _init(resolve_level(level), target)
}

fn _init(level: Level, target: LogTarget) -> io::Result<()> {
    static LOGGER: OnceLock<Logger> = OnceLock::new();

    // Only the first call installs the logger; later calls keep the original
    // level so that the logger and log::max_level never disagree.
    let init_call = LOGGER.get().is_none();

    let logger = LOGGER.get_or_init(|| Logger { level, target });

    if init_call {
        log::set_logger(logger).map_err(|e| io::Error::other(e.to_string()))?;
        log::set_max_level(logger.level.to_level_filter());
    }

    Ok(())
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
