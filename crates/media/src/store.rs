use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

/// Content-addressed key: uppercase hex SHA-256 of `body`.
///
/// Identical bodies share a key whatever URL they were fetched from.
pub fn storage_key(body: &[u8]) -> String {
    format!("{:X}", Sha256::digest(body))
}

/// Destination for fetched objects.
pub trait MediaStore: Sync {
    /// Persist `body` under `key` and return the stored URL recorded in the document.
    fn store(&self, key: &str, body: &[u8]) -> Result<String>;
}

/// Stores objects as files directly under a root directory.
pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create media root {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FsMediaStore {
    /// Copy `body` into a temp file under the root, then move it to `dest`.
    /// A failed copy never leaves a partial file under the key.
    fn write_new(&self, dest: &Path, mut body: impl Read) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.root)
            .with_context(|| format!("Failed to create temp file in {}", self.root.display()))?;
        io::copy(&mut body, &mut tmp)
            .with_context(|| format!("Failed to write {}", dest.display()))?;

        match tmp.persist_noclobber(dest) {
            Ok(_) => Ok(()),
            // Keys are content hashes: an existing file already holds these bytes.
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e.error).with_context(|| format!("Failed to create {}", dest.display())),
        }
    }
}

impl MediaStore for FsMediaStore {
    fn store(&self, key: &str, body: &[u8]) -> Result<String> {
        let dest = self.root.join(key);
        if !dest.exists() {
            self.write_new(&dest, body)?;
        }
        Ok(key.to_string())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
