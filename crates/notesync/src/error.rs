//! Error types for notesync.
//!
//! This module defines all error types used throughout the notesync crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for notesync operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Store Errors ===
    /// Failed to read or parse a notes document.
    #[error("failed to read notes document at {path}: {source}")]
    DocumentRead {
        /// Path to the document.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The document was written by a newer version of notesync.
    #[error("unsupported notes document format version {found} (max supported: {supported})")]
    UnsupportedFormat {
        /// Version found in the document.
        found: u32,
        /// Highest version this build understands.
        supported: u32,
    },

    // === Note Errors ===
    /// No note matches the given id or prefix.
    #[error("note not found: {id}")]
    NoteNotFound {
        /// The id or prefix that was looked up.
        id: String,
    },

    /// A note with this id already exists.
    #[error("note already exists: {id}")]
    NoteExists {
        /// The conflicting id.
        id: String,
    },

    /// An id prefix matches more than one note.
    #[error("ambiguous note id '{prefix}' matches {count} notes")]
    AmbiguousId {
        /// The prefix that was looked up.
        prefix: String,
        /// Number of matching notes.
        count: usize,
    },

    // === Sync Errors ===
    /// No remote folder is configured.
    #[error("no sync folder configured (use `notes remote set <DIR>`)")]
    RemoteNotConfigured,

    /// The remote folder is missing or unusable.
    #[error("invalid sync folder {path}: {message}")]
    RemoteInvalid {
        /// Path to the remote folder.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for notesync operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a note-not-found error.
    #[must_use]
    pub fn note_not_found(id: impl Into<String>) -> Self {
        Self::NoteNotFound { id: id.into() }
    }

    /// Create an invalid remote folder error.
    #[must_use]
    pub fn remote_invalid(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::RemoteInvalid {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Check if this error means a note lookup failed.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoteNotFound { .. })
    }

    /// Check if this error is about the sync folder.
    #[must_use]
    pub fn is_remote_error(&self) -> bool {
        matches!(self, Self::RemoteNotConfigured | Self::RemoteInvalid { .. })
    }
}
