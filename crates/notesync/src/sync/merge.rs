//! Last-write-wins merge of two note maps.
//!
//! For every id present on either side the merge keeps exactly one copy:
//!
//! - present on one side only: that copy, tombstones included;
//! - present on both, either one a tombstone: the newer copy;
//! - present on both, edited within the conflict window with different
//!   content: the local copy, and the pair is reported as a [`SyncConflict`];
//! - otherwise: the newer copy.
//!
//! A conflict copy gets an id derived from the note id and the preserved
//! content, so the same conflict always yields the same copy. Once a copy of
//! either side exists on either side, the pair is no longer a conflict and
//! the newer copy wins, which lets both devices converge.
//!
//! "Newer" compares `last_modified`, then `version`; a full tie keeps the
//! local copy.

use std::cmp::Ordering;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::note::Note;
use crate::store::NoteMap;

/// Title prefix given to the copy created for a conflicting remote edit.
pub const CONFLICT_TITLE_PREFIX: &str = "Conflict: ";

/// Default window inside which two different edits count as a conflict.
pub const DEFAULT_CONFLICT_WINDOW: Duration = Duration::from_secs(5);

/// Which copy a comparison picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The copy in the local store.
    Local,
    /// The copy from the other store or sync folder.
    Remote,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// Options for [`merge_notes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Edits closer together than this with different content conflict.
    /// A zero window disables conflict detection.
    pub conflict_window: Duration,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            conflict_window: DEFAULT_CONFLICT_WINDOW,
        }
    }
}

/// Two concurrent edits of the same note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConflict {
    /// Id of the contested note.
    pub note_id: String,
    /// The local copy (kept in the merged result).
    pub local: Note,
    /// The remote copy (preserved as a conflict copy).
    pub remote: Note,
}

impl SyncConflict {
    /// Build the note that preserves the losing remote edit.
    #[must_use]
    pub fn conflict_copy(&self) -> Note {
        conflict_copy(self)
    }
}

/// Counters describing a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Ids present only locally.
    pub local_only: usize,
    /// Ids present only remotely.
    pub remote_only: usize,
    /// Ids on both sides where the local copy won.
    pub local_wins: usize,
    /// Ids on both sides where the remote copy won.
    pub remote_wins: usize,
    /// Ids on both sides that conflicted.
    pub conflicts: usize,
}

/// Result of [`merge_notes`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// The merged notes, tombstones included.
    pub notes: NoteMap,
    /// Conflicts found; the local copy of each is in `notes`.
    pub conflicts: Vec<SyncConflict>,
    /// Counters.
    pub stats: MergeStats,
}

impl MergeOutcome {
    /// Add a conflict copy for every conflict to the merged notes.
    pub fn add_conflict_copies(&mut self) {
        for conflict in &self.conflicts {
            let copy = conflict.conflict_copy();
            info!(
                "Preserving remote edit of {} as conflict copy {}",
                crate::note::short_id(&conflict.note_id),
                copy.short_id()
            );
            self.notes.insert(copy.id.clone(), copy);
        }
    }

    /// Number of merged notes that are not tombstones.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.notes.values().filter(|n| !n.deleted).count()
    }

    /// Number of merged tombstones.
    #[must_use]
    pub fn tombstone_count(&self) -> usize {
        self.notes.values().filter(|n| n.deleted).count()
    }
}

/// Order two copies of a note by recency.
#[must_use]
pub fn recency(a: &Note, b: &Note) -> Ordering {
    a.last_modified
        .cmp(&b.last_modified)
        .then(a.version.cmp(&b.version))
}

/// Pick the newer of two copies; a full tie goes to the local copy.
#[must_use]
pub fn pick_newer(local: &Note, remote: &Note) -> Side {
    if recency(local, remote) == Ordering::Less {
        Side::Remote
    } else {
        Side::Local
    }
}

/// Check whether two live copies were edited concurrently with different
/// content.
#[must_use]
pub fn detect_conflict(local: &Note, remote: &Note, window: Duration) -> bool {
    if local.deleted || remote.deleted || window.is_zero() {
        return false;
    }
    let gap = (local.last_modified - remote.last_modified).abs();
    let within = gap
        .to_std()
        .map_or(false, |gap| gap < window);
    within && !local.same_content(remote)
}

/// Merge two note maps with last-write-wins.
#[must_use]
pub fn merge_notes(local: &NoteMap, remote: &NoteMap, options: &MergeOptions) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    for (id, local_note) in local {
        let Some(remote_note) = remote.get(id) else {
            debug!("Note {} only local", crate::note::short_id(id));
            outcome.stats.local_only += 1;
            outcome.notes.insert(id.clone(), local_note.clone());
            continue;
        };

        if detect_conflict(local_note, remote_note, options.conflict_window)
            && !conflict_preserved(id, local_note, remote_note, local, remote)
        {
            warn!("Conflicting edits for note {}", local_note.short_id());
            outcome.stats.conflicts += 1;
            outcome.conflicts.push(SyncConflict {
                note_id: id.clone(),
                local: local_note.clone(),
                remote: remote_note.clone(),
            });
            outcome.notes.insert(id.clone(), local_note.clone());
            continue;
        }

        let side = pick_newer(local_note, remote_note);
        debug!(
            "Note {}: {side} copy wins (local v{}, remote v{})",
            local_note.short_id(),
            local_note.version,
            remote_note.version
        );
        let winner = match side {
            Side::Local => {
                outcome.stats.local_wins += 1;
                local_note
            }
            Side::Remote => {
                outcome.stats.remote_wins += 1;
                remote_note
            }
        };
        outcome.notes.insert(id.clone(), winner.clone());
    }

    for (id, remote_note) in remote {
        if !local.contains_key(id) {
            debug!("Note {} only remote", crate::note::short_id(id));
            outcome.stats.remote_only += 1;
            outcome.notes.insert(id.clone(), remote_note.clone());
        }
    }

    info!(
        "Merge finished: {} active, {} tombstones, {} conflicts",
        outcome.active_count(),
        outcome.tombstone_count(),
        outcome.conflicts.len()
    );
    outcome
}

/// Check whether either side of a conflict already has a conflict copy in
/// either map.
fn conflict_preserved(
    id: &str,
    local_note: &Note,
    remote_note: &Note,
    local: &NoteMap,
    remote: &NoteMap,
) -> bool {
    [local_note, remote_note].iter().any(|note| {
        let copy_id = conflict_copy_id(id, note);
        let found = local.contains_key(&copy_id) || remote.contains_key(&copy_id);
        if found {
            debug!(
                "Conflict on {} already preserved as {}",
                crate::note::short_id(id),
                crate::note::short_id(&copy_id)
            );
        }
        found
    })
}

/// Id of the conflict copy that preserves `preserved` as a version of note
/// `note_id`.
#[must_use]
pub fn conflict_copy_id(note_id: &str, preserved: &Note) -> String {
    let name = format!("{note_id}:{}", preserved.content_hash());
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

/// Build a new note holding the remote side of a conflict.
#[must_use]
pub fn conflict_copy(conflict: &SyncConflict) -> Note {
    let remote = &conflict.remote;
    Note::new(
        format!("{CONFLICT_TITLE_PREFIX}{}", remote.title),
        remote.body.clone(),
    )
    .with_id(conflict_copy_id(&conflict.note_id, remote))
    .with_tags(&remote.tags)
    .with_last_modified(remote.last_modified)
    .with_version(remote.version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn note(id: &str, title: &str, body: &str, secs: i64, version: u64) -> Note {
        Note::new(title, body)
            .with_id(id)
            .with_last_modified(base_time() + ChronoDuration::seconds(secs))
            .with_version(version)
    }

    fn map(notes: Vec<Note>) -> NoteMap {
        notes.into_iter().map(|n| (n.id.clone(), n)).collect()
    }

    #[test]
    fn test_pick_newer_by_time() {
        let older = note("a", "t", "b", 0, 5);
        let newer = note("a", "t", "b", 60, 1);
        assert_eq!(pick_newer(&older, &newer), Side::Remote);
        assert_eq!(pick_newer(&newer, &older), Side::Local);
    }

    #[test]
    fn test_pick_newer_version_breaks_time_tie() {
        let v1 = note("a", "t", "b", 0, 1);
        let v2 = note("a", "t", "b", 0, 2);
        assert_eq!(pick_newer(&v1, &v2), Side::Remote);
        assert_eq!(pick_newer(&v2, &v1), Side::Local);
    }

    #[test]
    fn test_pick_newer_full_tie_is_local() {
        let a = note("a", "local", "b", 0, 3);
        let b = note("a", "remote", "b", 0, 3);
        assert_eq!(pick_newer(&a, &b), Side::Local);
    }

    #[test]
    fn test_side_display() {
        assert_eq!(Side::Local.to_string(), "local");
        assert_eq!(Side::Remote.to_string(), "remote");
    }

    #[test]
    fn test_detect_conflict_within_window() {
        let local = note("a", "t", "mine", 0, 2);
        let remote = note("a", "t", "theirs", 3, 2);
        assert!(detect_conflict(&local, &remote, DEFAULT_CONFLICT_WINDOW));
    }

    #[test]
    fn test_no_conflict_outside_window() {
        let local = note("a", "t", "mine", 0, 2);
        let remote = note("a", "t", "theirs", 5, 2);
        assert!(!detect_conflict(&local, &remote, DEFAULT_CONFLICT_WINDOW));
    }

    #[test]
    fn test_no_conflict_same_content() {
        let local = note("a", "t", "same", 0, 2);
        let remote = note("a", "t", "same", 1, 3);
        assert!(!detect_conflict(&local, &remote, DEFAULT_CONFLICT_WINDOW));
    }

    #[test]
    fn test_no_conflict_with_tombstone() {
        let local = note("a", "t", "mine", 0, 2);
        let mut remote = note("a", "t", "", 1, 3);
        remote.deleted = true;
        assert!(!detect_conflict(&local, &remote, DEFAULT_CONFLICT_WINDOW));
    }

    #[test]
    fn test_zero_window_disables_conflicts() {
        let local = note("a", "t", "mine", 0, 2);
        let remote = note("a", "t", "theirs", 0, 2);
        assert!(!detect_conflict(&local, &remote, Duration::ZERO));
    }

    #[test]
    fn test_merge_one_sided_notes() {
        let local = map(vec![note("l", "local", "", 0, 1)]);
        let remote = map(vec![note("r", "remote", "", 0, 1)]);

        let outcome = merge_notes(&local, &remote, &MergeOptions::default());
        assert_eq!(outcome.notes.len(), 2);
        assert_eq!(outcome.stats.local_only, 1);
        assert_eq!(outcome.stats.remote_only, 1);
        assert!(outcome.conflicts.is_empty());
    }

    #[test]
    fn test_merge_newer_wins_each_way() {
        let local = map(vec![
            note("a", "a-local-new", "", 100, 2),
            note("b", "b-local-old", "", 0, 1),
        ]);
        let remote = map(vec![
            note("a", "a-remote-old", "", 0, 1),
            note("b", "b-remote-new", "", 100, 2),
        ]);

        let outcome = merge_notes(&local, &remote, &MergeOptions::default());
        assert_eq!(outcome.notes["a"].title, "a-local-new");
        assert_eq!(outcome.notes["b"].title, "b-remote-new");
        assert_eq!(outcome.stats.local_wins, 1);
        assert_eq!(outcome.stats.remote_wins, 1);
    }

    #[test]
    fn test_merge_conflict_keeps_local() {
        let local = map(vec![note("a", "t", "mine", 0, 2)]);
        let remote = map(vec![note("a", "t", "theirs", 2, 2)]);

        let outcome = merge_notes(&local, &remote, &MergeOptions::default());
        assert_eq!(outcome.notes["a"].body, "mine");
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].remote.body, "theirs");
        assert_eq!(outcome.stats.conflicts, 1);
    }

    #[test]
    fn test_merge_tombstone_newer_wins() {
        let live = note("a", "t", "text", 0, 1);
        let mut tomb = note("a", "t", "", 60, 2);
        tomb.deleted = true;

        let outcome = merge_notes(
            &map(vec![live.clone()]),
            &map(vec![tomb.clone()]),
            &MergeOptions::default(),
        );
        assert!(outcome.notes["a"].deleted);
        assert_eq!(outcome.tombstone_count(), 1);
        assert_eq!(outcome.active_count(), 0);

        // A later edit beats an older tombstone.
        let revived = note("a", "t", "edited later", 120, 3);
        let outcome = merge_notes(
            &map(vec![tomb]),
            &map(vec![revived]),
            &MergeOptions::default(),
        );
        assert!(!outcome.notes["a"].deleted);
    }

    #[test]
    fn test_merge_is_symmetric_without_ties() {
        let a = map(vec![note("x", "one", "", 10, 2), note("y", "two", "", 0, 1)]);
        let b = map(vec![note("x", "uno", "", 0, 1), note("y", "dos", "", 10, 2)]);
        let opts = MergeOptions {
            conflict_window: Duration::ZERO,
        };

        let ab = merge_notes(&a, &b, &opts);
        let ba = merge_notes(&b, &a, &opts);
        assert_eq!(ab.notes, ba.notes);
    }

    #[test]
    fn test_merge_identical_maps() {
        let notes = map(vec![note("a", "t", "b", 0, 1), note("b", "t", "b", 0, 1)]);
        let outcome = merge_notes(&notes, &notes, &MergeOptions::default());
        assert_eq!(outcome.notes, notes);
        assert_eq!(outcome.stats.local_wins, 2);
        assert!(outcome.conflicts.is_empty());
    }

    #[test]
    fn test_conflict_copy() {
        let conflict = SyncConflict {
            note_id: "a".to_string(),
            local: note("a", "Plan", "mine", 0, 2),
            remote: note("a", "Plan", "theirs", 1, 4).with_tags(["x"]),
        };
        let copy = conflict.conflict_copy();

        assert_ne!(copy.id, "a");
        assert_eq!(copy.title, "Conflict: Plan");
        assert_eq!(copy.body, "theirs");
        assert_eq!(copy.tags, vec!["x"]);
        assert_eq!(copy.version, 4);
        assert_eq!(copy.last_modified, conflict.remote.last_modified);
    }

    #[test]
    fn test_conflict_copy_id_is_stable() {
        let conflict = SyncConflict {
            note_id: "a".to_string(),
            local: note("a", "Plan", "mine", 0, 2),
            remote: note("a", "Plan", "theirs", 1, 2),
        };
        let first = conflict.conflict_copy();
        let second = conflict.conflict_copy();
        assert_eq!(first.id, second.id);

        let mut other = conflict.clone();
        other.remote.body = "something else".to_string();
        assert_ne!(other.conflict_copy().id, first.id);
    }

    #[test]
    fn test_preserved_conflict_falls_back_to_newest() {
        let mine = note("a", "t", "mine", 0, 2);
        let theirs = note("a", "t", "theirs", 2, 2);
        let conflict = SyncConflict {
            note_id: "a".to_string(),
            local: theirs.clone(),
            remote: mine.clone(),
        };
        // The other device already kept "mine" as a conflict copy.
        let copy = conflict.conflict_copy();
        let remote = map(vec![theirs, copy.clone()]);

        let outcome = merge_notes(&map(vec![mine]), &remote, &MergeOptions::default());
        assert!(outcome.conflicts.is_empty());
        assert_eq!(outcome.notes["a"].body, "theirs");
        assert!(outcome.notes.contains_key(&copy.id));
        assert_eq!(outcome.stats.remote_wins, 1);
    }

    #[test]
    fn test_add_conflict_copies() {
        let local = map(vec![note("a", "t", "mine", 0, 2)]);
        let remote = map(vec![note("a", "t", "theirs", 1, 2)]);

        let mut outcome = merge_notes(&local, &remote, &MergeOptions::default());
        outcome.add_conflict_copies();

        assert_eq!(outcome.notes.len(), 2);
        assert!(outcome
            .notes
            .values()
            .any(|n| n.title.starts_with(CONFLICT_TITLE_PREFIX) && n.body == "theirs"));
    }
}
