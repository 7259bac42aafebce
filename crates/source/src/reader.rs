use std::{
    collections::VecDeque,
    fs::File,
    io::{BufRead, BufReader, Lines},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use cdr_schema::Record;
use flate2::read::MultiGzDecoder;
use log::{info, warn};

use crate::is_gzip;

#[derive(Debug, Clone, Copy, Default)]
pub struct SourceOptions {
    /// Stop reading a file at the first undecodable line instead of failing.
    /// Crawls that were killed mid-write leave a truncated last record.
    pub tolerate_truncation: bool,
    /// Maximum number of records across all inputs.
    pub limit: Option<usize>,
}

/// Open `path` for line reading, decompressing `.gz` files on the fly.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

    if is_gzip(path) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

struct OpenInput {
    path: PathBuf,
    lines: Lines<Box<dyn BufRead + Send>>,
    line_no: usize,
}

/// Lazily reads JSON-lines records from a list of inputs, one file and one
/// line at a time.
///
/// After a fatal error the source is exhausted.
pub struct RecordSource {
    pending: VecDeque<PathBuf>,
    current: Option<OpenInput>,
    options: SourceOptions,
    yielded: usize,
    done: bool,
}

impl RecordSource {
    pub fn new<I, P>(inputs: I, options: SourceOptions) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            pending: inputs.into_iter().map(Into::into).collect(),
            current: None,
            options,
            yielded: 0,
            done: false,
        }
    }

    /// Number of records produced so far.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    fn fail(&mut self, err: anyhow::Error) -> Option<Result<Record>> {
        self.done = true;
        self.current = None;
        self.pending.clear();
        Some(Err(err))
    }

    /// Either drop the rest of the current file or abort the run.
    fn bad_line(&mut self, err: anyhow::Error) -> Option<Result<Record>> {
        let Some(input) = self.current.take() else {
            return self.fail(err);
        };

        let err = err.context(format!(
            "{}: line {}",
            input.path.display(),
            input.line_no
        ));

        if self.options.tolerate_truncation {
            warn!("Dropping the rest of {}: {err:#}", input.path.display());
            None
        } else {
            self.fail(err)
        }
    }
}

impl Iterator for RecordSource {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            if let Some(limit) = self.options.limit {
                if self.yielded >= limit {
                    self.done = true;
                    return None;
                }
            }

            if self.current.is_none() {
                let Some(path) = self.pending.pop_front() else {
                    self.done = true;
                    return None;
                };

                info!("Starting {}", path.display());

                match open_input(&path) {
                    Ok(reader) => {
                        self.current = Some(OpenInput {
                            path,
                            lines: reader.lines(),
                            line_no: 0,
                        });
                    }
                    Err(e) => return self.fail(e),
                }
            }

            let Some(input) = self.current.as_mut() else {
                continue;
            };

            input.line_no += 1;

            let line = match input.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    if let Some(item) = self.bad_line(anyhow!(e)) {
                        return Some(item);
                    }
                    continue;
                }
                None => {
                    self.current = None;
                    continue;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<Record>(&line) {
                Ok(record) => {
                    self.yielded += 1;
                    return Some(Ok(record));
                }
                Err(e) => {
                    if let Some(item) = self.bad_line(anyhow!(e)) {
                        return Some(item);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
