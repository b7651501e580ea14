//! Synchronization between the local store and a remote snapshot.
//!
//! [`SyncManager`] loads the remote notes, merges them with the local store
//! using last-write-wins (see [`merge`]), and writes the merged set back to
//! both sides. Concurrent edits are kept: the local copy stays in place and
//! the remote edit is added as a separate "Conflict: ..." note.

pub mod auto;
pub mod merge;
pub mod remote;
pub mod state;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::store::NoteStore;

pub use auto::run_autosync;
pub use merge::{
    detect_conflict, merge_notes, pick_newer, MergeOptions, MergeOutcome, MergeStats, Side,
    SyncConflict,
};
pub use remote::{FolderRemote, Remote, RemoteSnapshot};
pub use state::SyncState;

/// Default age after which tombstones are removed for good.
pub const DEFAULT_TOMBSTONE_RETENTION_DAYS: u32 = 30;

/// Options for a [`SyncManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Merge options.
    pub merge: MergeOptions,
    /// Tombstones older than this are removed after a successful sync.
    /// `None` keeps them forever.
    pub tombstone_retention: Option<Duration>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            merge: MergeOptions::default(),
            tombstone_retention: Some(Duration::days(i64::from(
                DEFAULT_TOMBSTONE_RETENTION_DAYS,
            ))),
        }
    }
}

/// Summary of a completed sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Where the notes were synced to.
    pub remote: String,
    /// Active notes after the sync.
    pub active: usize,
    /// Tombstones kept after the sync.
    pub tombstones: usize,
    /// Conflicts found; each produced a conflict copy.
    pub conflicts: usize,
    /// Tombstones removed for age.
    pub cleaned: usize,
    /// Conflict-copy files folded in and removed.
    pub folded_files: usize,
    /// When the sync finished.
    pub finished_at: DateTime<Utc>,
}

/// Reconciles a [`NoteStore`] with a [`Remote`].
#[derive(Debug)]
pub struct SyncManager {
    remote: Box<dyn Remote>,
    options: SyncOptions,
    conflicts: Vec<SyncConflict>,
}

impl SyncManager {
    /// Create a sync manager.
    #[must_use]
    pub fn new(remote: Box<dyn Remote>, options: SyncOptions) -> Self {
        Self {
            remote,
            options,
            conflicts: Vec::new(),
        }
    }

    /// The remote this manager syncs with.
    #[must_use]
    pub fn remote(&self) -> &dyn Remote {
        self.remote.as_ref()
    }

    /// The manager's options.
    #[must_use]
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Conflicts found by the last [`sync`](Self::sync) or
    /// [`reconcile`](Self::reconcile).
    #[must_use]
    pub fn last_conflicts(&self) -> &[SyncConflict] {
        &self.conflicts
    }

    /// Run a full two-way sync.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote cannot be read or written or the local
    /// store cannot be saved. The local store may already hold the merged
    /// notes when saving the remote fails; the next sync pushes them again.
    pub fn sync(&mut self, store: &mut NoteStore) -> Result<SyncReport> {
        info!("Starting sync with {}", self.remote.name());

        let snapshot = self.remote.load()?;
        let mut outcome = merge_notes(store.notes(), &snapshot.notes, &self.options.merge);
        outcome.add_conflict_copies();

        let conflicts = outcome.conflicts.len();
        self.conflicts = std::mem::take(&mut outcome.conflicts);

        store.replace_all(outcome.notes)?;
        self.remote.save(store.notes())?;
        self.remote.discard(&snapshot.folded)?;

        let cleaned = match self.options.tombstone_retention {
            Some(retention) => store.cleanup_tombstones(retention)?,
            None => 0,
        };
        if cleaned > 0 {
            self.remote.save(store.notes())?;
        }

        let stats = store.stats();
        let report = SyncReport {
            remote: self.remote.name(),
            active: stats.active,
            tombstones: stats.tombstones,
            conflicts,
            cleaned,
            folded_files: snapshot.folded.len(),
            finished_at: Utc::now(),
        };
        info!(
            "Sync finished: {} active, {} conflicts, {} tombstones cleaned",
            report.active, report.conflicts, report.cleaned
        );
        Ok(report)
    }

    /// Merge another store into `local` without touching `other`.
    ///
    /// Conflict copies are added to `local`.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store cannot be saved.
    pub fn reconcile(&mut self, local: &mut NoteStore, other: &NoteStore) -> Result<MergeOutcome> {
        let outcome = reconcile_stores(local, other, &self.options.merge)?;
        self.conflicts.clone_from(&outcome.conflicts);
        Ok(outcome)
    }
}

/// One-way LWW import of `other` into `local`.
///
/// # Errors
///
/// Returns an error if the local store cannot be saved.
pub fn reconcile_stores(
    local: &mut NoteStore,
    other: &NoteStore,
    options: &MergeOptions,
) -> Result<MergeOutcome> {
    let mut outcome = merge_notes(local.notes(), other.notes(), options);
    outcome.add_conflict_copies();
    local.replace_all(outcome.notes.clone())?;
    Ok(outcome)
}
