//! Note storage for notesync.
//!
//! This module provides the JSON-backed [`NoteStore`]: an in-memory map of
//! notes keyed by id that is written back to a single document after every
//! change. Deleted notes are kept as tombstones so deletions can be synced.

pub mod document;
pub mod migrations;

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::note::{Note, NoteUpdate};

pub use document::{NoteMap, NotesDocument};

/// Ordering for [`NoteStore::sorted`]. Pinned notes always come first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Most recently modified first.
    #[default]
    Newest,
    /// Least recently modified first.
    Oldest,
    /// Title A-Z, case-insensitive.
    Title,
    /// Title Z-A, case-insensitive.
    TitleDesc,
    /// Longest body first.
    Size,
}

/// JSON-backed note store.
#[derive(Debug)]
pub struct NoteStore {
    /// Backing file, `None` for an in-memory store.
    path: Option<PathBuf>,
    /// All notes, tombstones included.
    notes: NoteMap,
}

impl NoteStore {
    /// Open or create a store at the given path.
    ///
    /// Creates the parent directories and an empty document if needed. A
    /// file that cannot be parsed is moved aside to
    /// `<name>.corrupt-<timestamp>` and the store starts empty.
    ///
    /// # Errors
    ///
    /// Returns an error if directories or files cannot be created or read,
    /// or if the document uses an unsupported format version.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening note store at {}", path.display());
        let mut store = Self {
            path: Some(path),
            notes: NoteMap::new(),
        };
        store.reload()?;

        info!(
            "Note store opened with {} notes ({} total entries)",
            store.len(),
            store.notes.len()
        );
        Ok(store)
    }

    /// Create a store that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            notes: NoteMap::new(),
        }
    }

    /// Build an in-memory store from an existing map.
    #[must_use]
    pub fn from_notes(notes: NoteMap) -> Self {
        Self { path: None, notes }
    }

    /// Get the path to the backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Re-read the backing file, replacing the in-memory notes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or written.
    pub fn reload(&mut self) -> Result<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };

        match NotesDocument::read_optional(&path) {
            Ok(Some(doc)) => {
                self.notes = doc.notes;
            }
            Ok(None) => {
                debug!("No notes file at {}, creating empty store", path.display());
                self.notes.clear();
                self.save()?;
            }
            Err(Error::DocumentRead { source, .. }) => {
                let aside = corrupt_path(&path);
                warn!(
                    "Notes file {} is unreadable ({source}); moving it to {}",
                    path.display(),
                    aside.display()
                );
                fs::rename(&path, &aside)?;
                self.notes.clear();
                self.save()?;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Write all notes to the backing file. A no-op for in-memory stores.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written.
    pub fn save(&self) -> Result<()> {
        if let Some(path) = &self.path {
            NotesDocument::new(self.notes.clone()).write(path)?;
        }
        Ok(())
    }

    /// Add a note.
    ///
    /// # Errors
    ///
    /// Returns an error if a note with the same id exists or saving fails.
    pub fn add(&mut self, note: Note) -> Result<()> {
        if self.notes.contains_key(&note.id) {
            return Err(Error::NoteExists { id: note.id });
        }
        debug!("Adding note {}", note.short_id());
        self.notes.insert(note.id.clone(), note);
        self.save()
    }

    /// Create and add a new note, returning its id.
    ///
    /// # Errors
    ///
    /// Returns an error if saving fails.
    pub fn create(
        &mut self,
        title: impl Into<String>,
        body: impl Into<String>,
        tags: Vec<String>,
    ) -> Result<String> {
        let note = Note::new(title, body).with_tags(tags);
        let id = note.id.clone();
        self.add(note)?;
        Ok(id)
    }

    /// Apply an edit to an active note.
    ///
    /// Returns `false` if no active note has this id.
    ///
    /// # Errors
    ///
    /// Returns an error if saving fails.
    pub fn update(&mut self, id: &str, update: NoteUpdate) -> Result<bool> {
        match self.active_mut(id) {
            Some(note) => {
                note.apply(update);
                debug!("Updated note {} to v{}", note.short_id(), note.version);
            }
            None => return Ok(false),
        }
        self.save()?;
        Ok(true)
    }

    /// Soft-delete a note, leaving a tombstone.
    ///
    /// Returns `false` if no active note has this id.
    ///
    /// # Errors
    ///
    /// Returns an error if saving fails.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        match self.active_mut(id) {
            Some(note) => {
                note.mark_deleted();
                debug!("Deleted note {}", note.short_id());
            }
            None => return Ok(false),
        }
        self.save()?;
        Ok(true)
    }

    /// Pin or unpin an active note.
    ///
    /// Returns `false` if no active note has this id.
    ///
    /// # Errors
    ///
    /// Returns an error if saving fails.
    pub fn set_pinned(&mut self, id: &str, pinned: bool) -> Result<bool> {
        match self.active_mut(id) {
            Some(note) => note.set_pinned(pinned),
            None => return Ok(false),
        }
        self.save()?;
        Ok(true)
    }

    fn active_mut(&mut self, id: &str) -> Option<&mut Note> {
        self.notes.get_mut(id).filter(|n| !n.deleted)
    }

    /// Get an active note by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Note> {
        self.notes.get(id).filter(|n| !n.deleted)
    }

    /// Get a note by id, tombstones included.
    #[must_use]
    pub fn get_including_deleted(&self, id: &str) -> Option<&Note> {
        self.notes.get(id)
    }

    /// Resolve a full id or a unique id prefix to a full id.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing matches or the prefix is ambiguous.
    pub fn resolve_id(&self, prefix: &str) -> Result<String> {
        if self.notes.contains_key(prefix) {
            return Ok(prefix.to_string());
        }
        let matches: Vec<&String> = if prefix.is_empty() {
            Vec::new()
        } else {
            self.notes
                .keys()
                .filter(|id| id.starts_with(prefix))
                .collect()
        };
        match matches.len() {
            0 => Err(Error::note_not_found(prefix)),
            1 => Ok(matches[0].clone()),
            count => Err(Error::AmbiguousId {
                prefix: prefix.to_string(),
                count,
            }),
        }
    }

    /// Get all active notes, in id order.
    #[must_use]
    pub fn all(&self) -> Vec<&Note> {
        self.notes.values().filter(|n| !n.deleted).collect()
    }

    /// Get all notes, tombstones included.
    #[must_use]
    pub fn all_including_deleted(&self) -> Vec<&Note> {
        self.notes.values().collect()
    }

    /// Get only the tombstones.
    #[must_use]
    pub fn tombstones(&self) -> Vec<&Note> {
        self.notes.values().filter(|n| n.deleted).collect()
    }

    /// Borrow the full note map.
    #[must_use]
    pub fn notes(&self) -> &NoteMap {
        &self.notes
    }

    /// Clone the full note map.
    #[must_use]
    pub fn snapshot(&self) -> NoteMap {
        self.notes.clone()
    }

    /// Replace every note with `notes` and save.
    ///
    /// # Errors
    ///
    /// Returns an error if saving fails.
    pub fn replace_all(&mut self, notes: NoteMap) -> Result<()> {
        self.notes = notes;
        self.save()
    }

    /// Get active notes in the given order, pinned notes first.
    #[must_use]
    pub fn sorted(&self, order: SortOrder) -> Vec<&Note> {
        let mut notes = self.all();
        notes.sort_by(|a, b| {
            b.pinned
                .cmp(&a.pinned)
                .then_with(|| compare(a, b, order))
                .then_with(|| a.id.cmp(&b.id))
        });
        notes
    }

    /// Search active notes by title, body and tags.
    ///
    /// Performs a case-insensitive substring search. An empty query matches
    /// every note.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&Note> {
        let query = query.trim().to_lowercase();
        self.notes
            .values()
            .filter(|n| !n.deleted && n.matches_lowercase(&query))
            .collect()
    }

    /// Get active notes carrying a tag (case-insensitive).
    #[must_use]
    pub fn with_tag(&self, tag: &str) -> Vec<&Note> {
        self.notes
            .values()
            .filter(|n| !n.deleted && n.has_tag(tag))
            .collect()
    }

    /// Get every tag used by an active note, sorted and unique.
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .notes
            .values()
            .filter(|n| !n.deleted)
            .flat_map(|n| n.tags.iter().cloned())
            .collect();
        tags.sort();
        tags.dedup();
        tags
    }

    /// Permanently remove tombstones older than `older_than`.
    ///
    /// Returns the number of tombstones removed.
    ///
    /// # Errors
    ///
    /// Returns an error if saving fails.
    pub fn cleanup_tombstones(&mut self, older_than: Duration) -> Result<usize> {
        let cutoff = Utc::now() - older_than;
        let before = self.notes.len();
        self.notes
            .retain(|_, n| !(n.deleted && n.last_modified < cutoff));
        let removed = before - self.notes.len();

        if removed > 0 {
            info!("Removed {} tombstones older than {}", removed, cutoff.to_rfc3339());
            self.save()?;
        }
        Ok(removed)
    }

    /// Get store statistics.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let active: Vec<&Note> = self.all();
        let file_size_bytes = self
            .path
            .as_ref()
            .and_then(|p| fs::metadata(p).ok())
            .map_or(0, |m| m.len());

        StoreStats {
            total: self.notes.len(),
            active: active.len(),
            pinned: active.iter().filter(|n| n.pinned).count(),
            tombstones: self.notes.len() - active.len(),
            newest: active.iter().map(|n| n.last_modified).max(),
            oldest: active.iter().map(|n| n.last_modified).min(),
            file_size_bytes,
        }
    }

    /// Number of active notes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.notes.values().filter(|n| !n.deleted).count()
    }

    /// Check if there are no active notes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn compare(a: &Note, b: &Note, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Newest => b.last_modified.cmp(&a.last_modified),
        SortOrder::Oldest => a.last_modified.cmp(&b.last_modified),
        SortOrder::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        SortOrder::TitleDesc => b.title.to_lowercase().cmp(&a.title.to_lowercase()),
        SortOrder::Size => b.body.len().cmp(&a.body.len()),
    }
}

/// Pick an unused `<name>.corrupt-<timestamp>` sibling of `path`.
fn corrupt_path(path: &Path) -> PathBuf {
    let mut base = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
    base.push(format!(".corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S%.3f")));

    let mut candidate = path.with_file_name(&base);
    let mut n = 1u32;
    while candidate.exists() {
        let mut name = base.clone();
        name.push(format!("-{n}"));
        candidate = path.with_file_name(name);
        n += 1;
    }
    candidate
}

/// Statistics about the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// All entries, tombstones included.
    pub total: usize,
    /// Notes that are not deleted.
    pub active: usize,
    /// Active pinned notes.
    pub pinned: usize,
    /// Deleted notes kept for sync.
    pub tombstones: usize,
    /// Most recent modification among active notes.
    pub newest: Option<DateTime<Utc>>,
    /// Oldest modification among active notes.
    pub oldest: Option<DateTime<Utc>>,
    /// Size of the backing file in bytes.
    pub file_size_bytes: u64,
}
