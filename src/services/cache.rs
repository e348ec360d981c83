//! Last-known-good payload cache
//!
//! One file per upstream resource, written after every successful fetch and
//! read only when retries are exhausted. The directory is injected at
//! construction so tests can point the cache anywhere.

use crate::error::{Error, Result};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PayloadCache {
    dir: PathBuf,
}

impl PayloadCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Cache key for a per-protocol detail payload.
    pub fn detail_key(slug: &str) -> String {
        format!("protocol-{}", slug)
    }

    /// Store the raw payload bytes for a resource. Callers treat failures as
    /// best-effort and only log them.
    pub fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| Error::Io(format!("Failed to create cache dir: {}", e)))?;
        let path = self.path(key);
        fs::write(&path, bytes)
            .map_err(|e| Error::Io(format!("Failed to write {}: {}", path.display(), e)))?;
        debug!(key, bytes = bytes.len(), "Cached payload");
        Ok(())
    }

    /// The most recent cached payload for a resource, if any.
    pub fn read(&self, key: &str) -> Option<Vec<u8>> {
        fs::read(self.path(key)).ok()
    }
}
