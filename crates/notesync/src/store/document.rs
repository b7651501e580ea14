//! On-disk JSON document shared by the local store and sync folders.
//!
//! ```json
//! {
//!   "notes": { "<id>": { "id": "<id>", "title": "...", ... } },
//!   "meta": { "format_version": 1, "saved_at": "...", "count": 1 }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::note::Note;

use super::migrations;

/// Notes keyed by id.
pub type NoteMap = BTreeMap<String, Note>;

/// Document metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Layout version; documents without it are treated as version 0.
    #[serde(default)]
    pub format_version: u32,
    /// When the document was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    /// Number of entries in `notes` (tombstones included).
    #[serde(default)]
    pub count: usize,
}

impl Default for DocumentMeta {
    fn default() -> Self {
        Self {
            format_version: 0,
            saved_at: None,
            count: 0,
        }
    }
}

/// A complete notes document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotesDocument {
    /// All notes, tombstones included.
    #[serde(default)]
    pub notes: NoteMap,
    /// Metadata block.
    #[serde(default)]
    pub meta: DocumentMeta,
}

impl NotesDocument {
    /// Build a document ready to be written.
    #[must_use]
    pub fn new(notes: NoteMap) -> Self {
        let count = notes.len();
        Self {
            notes,
            meta: DocumentMeta {
                format_version: migrations::CURRENT_VERSION,
                saved_at: Some(Utc::now()),
                count,
            },
        }
    }

    /// Parse a document from JSON text and bring it to the current format.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid document or was written
    /// by a newer format version.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let mut doc: Self = serde_json::from_str(text).map_err(|source| Error::DocumentRead {
            path: path.to_path_buf(),
            source,
        })?;
        migrations::upgrade(&mut doc)?;
        Ok(doc)
    }

    /// Read a document from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text, path)
    }

    /// Read a document, returning `None` when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn read_optional(path: &Path) -> Result<Option<Self>> {
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text, path).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the document atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any file operation fails.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, json.as_bytes())
    }
}

/// Sibling path used while writing `path`.
#[must_use]
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `contents` to a temp file next to `path`, fsync it, and rename it
/// over `path`.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = temp_path(path);
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;

    if let Some(dir) = path.parent() {
        if let Ok(d) = fs::File::open(dir) {
            let _ = d.sync_all();
        }
    }
    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}
