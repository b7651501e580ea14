//! `notesync` - a JSON-backed note store with last-write-wins folder sync
//!
//! Notes live in a single JSON document on disk. [`sync::SyncManager`]
//! reconciles that document with a copy in a shared folder (kept in sync
//! between machines by a cloud client), resolving concurrent edits with
//! last-write-wins and keeping conflicting edits as separate notes.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod note;
pub mod store;
pub mod sync;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use note::{Note, NoteUpdate};
pub use store::{NoteStore, SortOrder, StoreStats};
pub use sync::{SyncManager, SyncOptions, SyncReport};
