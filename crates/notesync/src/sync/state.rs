//! Persistent sync state: the chosen sync folder and the last sync time.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::store::document::write_atomic;

use super::remote::validate_dir;
use super::SyncReport;

/// State kept between runs in `sync_state.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncState {
    /// Sync folder chosen with `notes remote set`.
    pub remote_dir: Option<PathBuf>,
    /// When the last successful sync finished.
    pub last_sync: Option<DateTime<Utc>>,
    /// Number of conflicts in the last successful sync.
    pub last_conflicts: usize,
}

impl SyncState {
    /// Load the state file.
    ///
    /// A missing file yields the default state, and so does a file that is
    /// not valid JSON (with a warning).
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, so that a
    /// later [`save`](Self::save) never replaces state it could not see.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                warn!("Cannot read sync state {}: {e}", path.display());
                return Err(e.into());
            }
        };
        Ok(serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!("Ignoring unparsable sync state {}: {e}", path.display());
            Self::default()
        }))
    }

    /// Write the state file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its directory cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, json.as_bytes())
    }

    /// Choose a sync folder.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` is not an existing directory.
    pub fn set_remote_dir(&mut self, dir: impl Into<PathBuf>) -> Result<()> {
        let dir = dir.into();
        validate_dir(&dir)?;
        info!("Sync folder set to {}", dir.display());
        self.remote_dir = Some(dir);
        Ok(())
    }

    /// Forget the sync folder.
    pub fn clear_remote_dir(&mut self) {
        self.remote_dir = None;
    }

    /// Remember the outcome of a successful sync.
    pub fn record_sync(&mut self, report: &SyncReport) {
        self.last_sync = Some(report.finished_at);
        self.last_conflicts = report.conflicts;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let state = SyncState::load(&dir.path().join("sync_state.json")).unwrap();
        assert_eq!(state, SyncState::default());
    }

    #[test]
    fn test_load_garbage_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync_state.json");
        std::fs::write(&path, "garbage").unwrap();
        assert_eq!(SyncState::load(&path).unwrap(), SyncState::default());
    }

    #[test]
    fn test_load_unreadable_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync_state.json");
        // A directory in place of the file fails to read without being missing.
        std::fs::create_dir(&path).unwrap();

        let err = SyncState::load(&path).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/sync_state.json");

        let mut state = SyncState::default();
        state.set_remote_dir(dir.path()).unwrap();
        state.last_sync = Some(Utc::now());
        state.save(&path).unwrap();

        assert_eq!(SyncState::load(&path).unwrap(), state);
    }

    #[test]
    fn test_set_remote_dir_rejects_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = SyncState::default();
        let err = state.set_remote_dir(dir.path().join("missing")).unwrap_err();

        assert!(err.is_remote_error());
        assert!(state.remote_dir.is_none());
    }

    #[test]
    fn test_clear_remote_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = SyncState::default();
        state.set_remote_dir(dir.path()).unwrap();
        state.clear_remote_dir();
        assert!(state.remote_dir.is_none());
    }

    #[test]
    fn test_record_sync() {
        let mut state = SyncState::default();
        let report = SyncReport {
            remote: "x".to_string(),
            active: 3,
            tombstones: 0,
            conflicts: 2,
            cleaned: 0,
            folded_files: 0,
            finished_at: Utc::now(),
        };
        state.record_sync(&report);
        assert_eq!(state.last_sync, Some(report.finished_at));
        assert_eq!(state.last_conflicts, 2);
    }
}
