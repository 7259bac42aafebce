use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use flate2::{Compression, write::GzEncoder};
use serde::Serialize;

enum Output {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Output {
    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Output::Plain(w) => w,
            Output::Gzip(w) => w,
        }
    }
}

/// Writes one JSON document per line, gzip-compressed for `.gz` paths.
///
/// `finish` must be called to flush buffers and write the gzip trailer.
pub struct JsonLinesWriter {
    path: PathBuf,
    output: Output,
    written: usize,
}

impl JsonLinesWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let buffered = BufWriter::new(file);

        let output = if crate::is_gzip(path) {
            Output::Gzip(GzEncoder::new(buffered, Compression::default()))
        } else {
            Output::Plain(buffered)
        };

        Ok(Self {
            path: path.to_path_buf(),
            output,
            written: 0,
        })
    }

    pub fn write<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let writer = self.output.writer();
        serde_json::to_writer(&mut *writer, value)
            .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush everything to disk and return the number of lines written.
    pub fn finish(self) -> Result<usize> {
        let mut buffered = match self.output {
            Output::Plain(w) => w,
            Output::Gzip(w) => w
                .finish()
                .with_context(|| format!("Failed to finish {}", self.path.display()))?,
        };
        buffered
            .flush()
            .with_context(|| format!("Failed to flush {}", self.path.display()))?;
        Ok(self.written)
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
