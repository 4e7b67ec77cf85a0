use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use arena_core::Snapshot;

use crate::ledger::LedgerError;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("standings source failed: {0}")]
    Source(#[from] LedgerError),
}

/// The snapshot file.
///
/// Writes go to a temporary file in the same directory which is then renamed over the
/// target, so a reader sees either the previous complete snapshot or the new one.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically replace the snapshot file on the blocking pool.
    pub async fn save(&self, snapshot: Snapshot) -> Result<(), SnapshotError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.write(&snapshot))
            .await
            .map_err(|e| SnapshotError::Io(std::io::Error::other(e)))?
    }

    /// Atomically replace the snapshot file.
    pub fn write(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer(&mut tmp, snapshot)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        debug!(path = %self.path.display(), entries = snapshot.len(), "snapshot replaced");
        Ok(())
    }

    /// Load the current snapshot.
    pub async fn load(&self) -> Result<Snapshot, SnapshotError> {
        let raw = tokio::fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Load the current snapshot, degrading to an empty one on any failure.
    pub async fn load_or_empty(&self) -> Snapshot {
        match self.load().await {
            Ok(snapshot) => snapshot,
            Err(SnapshotError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no snapshot yet");
                Snapshot::empty()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "snapshot unreadable; serving empty");
                Snapshot::empty()
            }
        }
    }
}
