//! Remote note snapshots.
//!
//! A [`Remote`] is whatever the local store is reconciled against. The only
//! implementation that ships is [`FolderRemote`], a directory kept in sync
//! between machines by a cloud client (Dropbox, OneDrive, Syncthing, ...).
//! notesync never talks to the network itself.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::store::{NoteMap, NotesDocument};

use super::merge::recency;

/// Default name of the shared notes file inside a sync folder.
pub const REMOTE_FILE_NAME: &str = "notes.json";

/// A snapshot loaded from a remote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSnapshot {
    /// Notes on the remote, tombstones included.
    pub notes: NoteMap,
    /// Conflict-copy files whose notes were folded into `notes`.
    ///
    /// Pass them to [`Remote::discard`] once the merged result is saved.
    pub folded: Vec<PathBuf>,
}

/// A place notes are synced with.
pub trait Remote: Send + Sync + std::fmt::Debug {
    /// Human-readable location, for logs and reports.
    fn name(&self) -> String;

    /// Load the current remote notes.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote cannot be read.
    fn load(&self) -> Result<RemoteSnapshot>;

    /// Replace the remote notes.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote cannot be written.
    fn save(&self, notes: &NoteMap) -> Result<()>;

    /// Remove conflict copies that have been folded and saved.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be removed.
    fn discard(&self, folded: &[PathBuf]) -> Result<()>;
}

/// A sync folder on the local file system.
#[derive(Debug)]
pub struct FolderRemote {
    dir: PathBuf,
    file_name: String,
    conflict_patterns: Vec<Regex>,
}

impl FolderRemote {
    /// Use `dir` as a sync folder.
    ///
    /// `conflict_patterns` are regexes matched against file names in `dir`;
    /// matching files are treated as conflict copies of the notes file.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` is not an existing directory or a pattern
    /// does not compile.
    pub fn new(dir: impl Into<PathBuf>, conflict_patterns: &[String]) -> Result<Self> {
        let dir = dir.into();
        validate_dir(&dir)?;

        let conflict_patterns = conflict_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| Error::ConfigValidation {
                    message: format!("invalid conflict file pattern {p}: {e}"),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            dir,
            file_name: REMOTE_FILE_NAME.to_string(),
            conflict_patterns,
        })
    }

    /// Use a different file name for the shared notes file.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    /// The sync folder.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the shared notes file.
    #[must_use]
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// List conflict copies of the notes file, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be listed.
    pub fn find_conflict_files(&self) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if name == self.file_name.as_str() || name.ends_with(".tmp") {
                continue;
            }
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            if self.conflict_patterns.iter().any(|re| re.is_match(&name)) {
                info!("Found conflict copy {name}");
                found.push(entry.path());
            }
        }
        found.sort();
        Ok(found)
    }

    /// Fold the notes of one conflict copy into `notes`.
    ///
    /// A folded note replaces an existing one only when strictly newer.
    fn fold(notes: &mut NoteMap, path: &Path) -> Result<usize> {
        let doc = NotesDocument::read(path)?;
        let mut taken = 0;
        for (id, candidate) in doc.notes {
            let replace = notes
                .get(&id)
                .map_or(true, |existing| recency(&candidate, existing).is_gt());
            if replace {
                debug!("Taking note {} from {}", crate::note::short_id(&id), path.display());
                notes.insert(id, candidate);
                taken += 1;
            }
        }
        Ok(taken)
    }
}

impl Remote for FolderRemote {
    fn name(&self) -> String {
        self.dir.display().to_string()
    }

    fn load(&self) -> Result<RemoteSnapshot> {
        validate_dir(&self.dir)?;
        let path = self.file_path();

        let mut snapshot = RemoteSnapshot::default();
        match NotesDocument::read_optional(&path)? {
            Some(doc) => {
                info!("Loaded {} notes from {}", doc.notes.len(), path.display());
                snapshot.notes = doc.notes;
            }
            None => info!("No notes file in {} yet", self.dir.display()),
        }

        let conflict_files = self.find_conflict_files()?;
        if !conflict_files.is_empty() {
            warn!("Found {} conflict copies in sync folder", conflict_files.len());
        }
        for file in conflict_files {
            match Self::fold(&mut snapshot.notes, &file) {
                Ok(taken) => {
                    info!("Folded {} notes from {}", taken, file.display());
                    snapshot.folded.push(file);
                }
                Err(e) => error!("Skipping unreadable conflict copy {}: {e}", file.display()),
            }
        }

        Ok(snapshot)
    }

    fn save(&self, notes: &NoteMap) -> Result<()> {
        validate_dir(&self.dir)?;
        let path = self.file_path();
        NotesDocument::new(notes.clone()).write(&path)?;
        info!("Saved {} notes to {}", notes.len(), path.display());
        Ok(())
    }

    fn discard(&self, folded: &[PathBuf]) -> Result<()> {
        for file in folded {
            match fs::remove_file(file) {
                Ok(()) => info!("Removed folded conflict copy {}", file.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Check that `dir` exists and is a directory.
///
/// # Errors
///
/// Returns [`Error::RemoteInvalid`] otherwise.
pub fn validate_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Err(Error::remote_invalid(dir, "folder does not exist"));
    }
    if !dir.is_dir() {
        return Err(Error::remote_invalid(dir, "not a directory"));
    }
    Ok(())
}
