//! Durable JSON artifact persistence
//!
//! All writes are atomic: serialize into a temp file in the destination
//! directory, fsync, fix permissions, rename over the destination, then sync
//! the containing directory. A failure before the rename leaves the
//! destination untouched (the temp file is removed on drop).

use crate::constants::{
    FULL_OUTPUT_FILE, PROTOCOL_TVL_FILE, PROTOCOL_TVL_STATE_FILE, STATE_FILE, SUMMARY_OUTPUT_FILE,
};
use crate::error::{AppError, Result};
use crate::models::{
    FullOutput, PersistentState, ProtocolTvlOutput, SnapshotHistory, SummaryOutput,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| AppError::Io(format!("{} has no parent directory", path.display())))?;
    fs::create_dir_all(dir)
        .map_err(|e| AppError::Io(format!("Failed to create {}: {}", dir.display(), e)))?;

    let temp = NamedTempFile::new_in(dir)
        .map_err(|e| AppError::Io(format!("Failed to create temp file in {}: {}", dir.display(), e)))?;
    serde_json::to_writer_pretty(temp.as_file(), value)?;
    temp.as_file()
        .sync_all()
        .map_err(|e| AppError::Io(format!("Failed to sync temp file: {}", e)))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))
            .map_err(|e| AppError::Io(format!("Failed to set permissions: {}", e)))?;
    }

    temp.persist(path)
        .map_err(|e| AppError::Io(format!("Failed to rename into {}: {}", path.display(), e)))?;
    fs::File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| AppError::Io(format!("Failed to sync {}: {}", dir.display(), e)))?;
    debug!(path = %path.display(), "Committed artifact");
    Ok(())
}

/// Reads and persists the pipeline's artifacts under one output directory.
/// In dry-run mode every write becomes a logged no-op.
pub struct OutputStore {
    dir: PathBuf,
    dry_run: bool,
}

impl OutputStore {
    pub fn new(dir: PathBuf, dry_run: bool) -> Self {
        Self { dir, dry_run }
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Missing file → `None`; present but unparseable → warn and `None`.
    fn read_json<T: DeserializeOwned>(&self, file: &str) -> Option<T> {
        let path = self.path(file);
        let bytes = fs::read(&path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Artifact unreadable; ignoring");
                None
            }
        }
    }

    pub fn load_state(&self) -> PersistentState {
        self.read_json(STATE_FILE).unwrap_or_default()
    }

    pub fn load_protocol_tvl_state(&self) -> PersistentState {
        self.read_json(PROTOCOL_TVL_STATE_FILE).unwrap_or_default()
    }

    /// Snapshot history carried over from the previous full output.
    /// Anything missing or malformed degrades to an empty history.
    pub fn load_history(&self) -> SnapshotHistory {
        #[derive(Deserialize)]
        struct HistoryOnly {
            #[serde(default)]
            history: SnapshotHistory,
        }
        self.read_json::<HistoryOnly>(FULL_OUTPUT_FILE)
            .map(|h| h.history)
            .unwrap_or_default()
    }

    pub fn commit(
        &self,
        full: &FullOutput,
        summary: &SummaryOutput,
        state: &PersistentState,
    ) -> Result<()> {
        if self.dry_run {
            info!(
                timestamp = full.timestamp,
                total_tvs = full.total_tvs,
                "Dry run; skipping artifact writes"
            );
            return Ok(());
        }
        atomic_write_json(&self.path(FULL_OUTPUT_FILE), full)?;
        atomic_write_json(&self.path(SUMMARY_OUTPUT_FILE), summary)?;
        atomic_write_json(&self.path(STATE_FILE), state)?;
        info!(
            dir = %self.dir.display(),
            timestamp = full.timestamp,
            "Committed output artifacts"
        );
        Ok(())
    }

    pub fn commit_protocol_tvl(
        &self,
        output: &ProtocolTvlOutput,
        state: &PersistentState,
    ) -> Result<()> {
        if self.dry_run {
            info!(
                protocols = output.protocols.len(),
                "Dry run; skipping protocol TVL writes"
            );
            return Ok(());
        }
        atomic_write_json(&self.path(PROTOCOL_TVL_FILE), output)?;
        atomic_write_json(&self.path(PROTOCOL_TVL_STATE_FILE), state)?;
        Ok(())
    }
}
