//! Document format migrations.
//!
//! Each document records a `format_version` in its `meta` block. Documents
//! written before versioning existed have no version and are treated as 0.

use tracing::{debug, info};

use crate::error::{Error, Result};

use super::document::NotesDocument;

/// The current document format version.
pub const CURRENT_VERSION: u32 = 1;

/// Bring a freshly parsed document up to [`CURRENT_VERSION`].
///
/// # Errors
///
/// Returns an error if the document is newer than this build supports.
pub fn upgrade(doc: &mut NotesDocument) -> Result<()> {
    let found = doc.meta.format_version;
    if found > CURRENT_VERSION {
        return Err(Error::UnsupportedFormat {
            found,
            supported: CURRENT_VERSION,
        });
    }

    let mut current = found;
    while current < CURRENT_VERSION {
        current += 1;
        run_migration(doc, current);
    }

    if found < CURRENT_VERSION {
        debug!("Upgraded notes document from v{found} to v{CURRENT_VERSION}");
    }
    doc.meta.format_version = CURRENT_VERSION;
    doc.meta.count = doc.notes.len();
    Ok(())
}

/// Run a specific migration.
fn run_migration(doc: &mut NotesDocument, version: u32) {
    if version == 1 {
        migrate_v1(doc);
    }
}

/// v0 -> v1: the map key is authoritative for a note's id.
///
/// Early documents could hold notes without an `id` field, or with one that
/// disagrees with the key they are stored under.
fn migrate_v1(doc: &mut NotesDocument) {
    let mut fixed = 0usize;
    for (key, note) in &mut doc.notes {
        if note.id != *key {
            note.id.clone_from(key);
            fixed += 1;
        }
        if note.version == 0 {
            note.version = 1;
        }
    }
    if fixed > 0 {
        info!("Repaired {fixed} note ids from document keys");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::Note;

    fn legacy_doc() -> NotesDocument {
        let mut doc = NotesDocument::default();
        doc.notes
            .insert("key-1".to_string(), Note::new("A", "").with_id(""));
        doc.notes
            .insert("key-2".to_string(), Note::new("B", "").with_id("key-2"));
        doc
    }

    #[test]
    fn test_upgrade_repairs_ids() {
        let mut doc = legacy_doc();
        upgrade(&mut doc).unwrap();

        assert_eq!(doc.notes["key-1"].id, "key-1");
        assert_eq!(doc.notes["key-2"].id, "key-2");
        assert_eq!(doc.meta.format_version, CURRENT_VERSION);
        assert_eq!(doc.meta.count, 2);
    }

    #[test]
    fn test_upgrade_current_is_noop() {
        let mut doc = legacy_doc();
        doc.meta.format_version = CURRENT_VERSION;
        upgrade(&mut doc).unwrap();

        // Already current: the mismatched id is left alone.
        assert_eq!(doc.notes["key-1"].id, "");
    }

    #[test]
    fn test_upgrade_rejects_newer_format() {
        let mut doc = NotesDocument::default();
        doc.meta.format_version = CURRENT_VERSION + 1;

        let err = upgrade(&mut doc).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_upgrade_parsed_legacy_json() {
        let json = r#"{"notes": {"abc": {"title": "no id here", "body": "x",
            "last_modified": "2024-01-01T00:00:00+00:00"}}}"#;
        let doc = NotesDocument::parse(json, std::path::Path::new("n.json")).unwrap();
        assert_eq!(doc.notes["abc"].id, "abc");
    }
}
