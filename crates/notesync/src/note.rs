//! Core note types for notesync.
//!
//! A [`Note`] carries its own last-write-wins metadata: the UTC time of the
//! last change and a version counter that grows with every edit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of id characters shown in listings and log lines.
const SHORT_ID_LEN: usize = 8;

fn default_version() -> u64 {
    1
}

/// A single note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier (UUID v4 for notes created locally).
    #[serde(default)]
    pub id: String,

    /// Note title.
    #[serde(default)]
    pub title: String,

    /// Note text.
    #[serde(default)]
    pub body: String,

    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Pinned notes sort before all others.
    #[serde(default)]
    pub pinned: bool,

    /// Tombstone flag. Deleted notes stay in the store so that the
    /// deletion reaches other devices on the next sync.
    #[serde(default)]
    pub deleted: bool,

    /// When this note was last changed.
    #[serde(default = "Utc::now")]
    pub last_modified: DateTime<Utc>,

    /// Edit counter, starts at 1.
    #[serde(default = "default_version")]
    pub version: u64,
}

/// A partial edit applied with [`Note::apply`].
///
/// Fields left as `None` keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteUpdate {
    /// New title.
    pub title: Option<String>,
    /// New body.
    pub body: Option<String>,
    /// New tag list.
    pub tags: Option<Vec<String>>,
}

impl NoteUpdate {
    /// Check whether the update would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none() && self.tags.is_none()
    }
}

impl Note {
    /// Create a new note with a fresh id, stamped now at version 1.
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            body: body.into(),
            tags: Vec::new(),
            pinned: false,
            deleted: false,
            last_modified: Utc::now(),
            version: 1,
        }
    }

    /// Replace the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Replace the tags, normalizing them.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = normalize_tags(tags);
        self
    }

    /// Replace the modification time.
    #[must_use]
    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = last_modified;
        self
    }

    /// Replace the version counter.
    #[must_use]
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version.max(1);
        self
    }

    /// Apply a partial edit and bump the LWW metadata.
    pub fn apply(&mut self, update: NoteUpdate) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(body) = update.body {
            self.body = body;
        }
        if let Some(tags) = update.tags {
            self.tags = normalize_tags(tags);
        }
        self.touch();
    }

    /// Mark the note as changed now.
    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
        self.version = self.version.saturating_add(1);
    }

    /// Pin or unpin the note.
    pub fn set_pinned(&mut self, pinned: bool) {
        self.pinned = pinned;
        self.touch();
    }

    /// Turn the note into a tombstone.
    ///
    /// Content is dropped; the title is kept so a tombstone is still
    /// recognizable in listings and logs.
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
        self.pinned = false;
        self.body.clear();
        self.tags.clear();
        self.touch();
    }

    /// BLAKE3 digest of the user-visible content (title, body, tags).
    #[must_use]
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.title.as_bytes());
        hasher.update(&[0]);
        hasher.update(self.body.as_bytes());
        for tag in &self.tags {
            hasher.update(&[0]);
            hasher.update(tag.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Check if two copies of a note show the same content.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.content_hash() == other.content_hash()
    }

    /// The first few characters of the id, for display.
    #[must_use]
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }

    /// Check if the note carries `tag` (case-insensitive).
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.to_lowercase();
        self.tags.iter().any(|t| t.to_lowercase() == tag)
    }

    /// Check if `query` occurs in the title, body or tags (case-insensitive).
    ///
    /// `query` must already be lowercase.
    #[must_use]
    pub(crate) fn matches_lowercase(&self, query: &str) -> bool {
        self.title.to_lowercase().contains(query)
            || self.body.to_lowercase().contains(query)
            || self.tags.iter().any(|t| t.to_lowercase().contains(query))
    }
}

/// Shorten an id for display. Ids shorter than the display width are
/// returned unchanged.
#[must_use]
pub fn short_id(id: &str) -> &str {
    id.char_indices()
        .nth(SHORT_ID_LEN)
        .map_or(id, |(idx, _)| &id[..idx])
}

/// Parse comma-separated tag input (`"work, urgent,  "`) into a tag list.
#[must_use]
pub fn parse_tags(text: &str) -> Vec<String> {
    normalize_tags(text.split(','))
}

/// Trim tags and drop empty entries and exact duplicates, keeping order.
fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_note_new() {
        let note = Note::new("Title", "Body");

        assert_eq!(note.title, "Title");
        assert_eq!(note.body, "Body");
        assert_eq!(note.version, 1);
        assert!(!note.deleted);
        assert!(!note.pinned);
        assert!(note.tags.is_empty());
        assert!(Uuid::parse_str(&note.id).is_ok());
    }

    #[test]
    fn test_note_ids_are_unique() {
        assert_ne!(Note::new("a", "").id, Note::new("a", "").id);
    }

    #[test]
    fn test_apply_bumps_version_and_time() {
        let mut note = Note::new("Old", "Body")
            .with_last_modified(Utc::now() - Duration::hours(1));
        let before = note.last_modified;

        note.apply(NoteUpdate {
            title: Some("New".to_string()),
            ..NoteUpdate::default()
        });

        assert_eq!(note.title, "New");
        assert_eq!(note.body, "Body");
        assert_eq!(note.version, 2);
        assert!(note.last_modified > before);
    }

    #[test]
    fn test_apply_normalizes_tags() {
        let mut note = Note::new("t", "b");
        note.apply(NoteUpdate {
            tags: Some(vec![" work ".to_string(), String::new(), "work".to_string()]),
            ..NoteUpdate::default()
        });
        assert_eq!(note.tags, vec!["work".to_string()]);
    }

    #[test]
    fn test_note_update_is_empty() {
        assert!(NoteUpdate::default().is_empty());
        let update = NoteUpdate {
            body: Some(String::new()),
            ..NoteUpdate::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn test_set_pinned_touches() {
        let mut note = Note::new("t", "b");
        note.set_pinned(true);
        assert!(note.pinned);
        assert_eq!(note.version, 2);
    }

    #[test]
    fn test_mark_deleted() {
        let mut note = Note::new("Doomed", "secret").with_tags(["a", "b"]);
        note.set_pinned(true);
        note.mark_deleted();

        assert!(note.deleted);
        assert!(!note.pinned);
        assert!(note.body.is_empty());
        assert!(note.tags.is_empty());
        assert_eq!(note.title, "Doomed");
        assert_eq!(note.version, 3);
    }

    #[test]
    fn test_content_hash_consistency() {
        let a = Note::new("Title", "Body").with_tags(["x"]);
        let b = Note::new("Title", "Body").with_tags(["x"]);
        assert_eq!(a.content_hash(), b.content_hash());
        assert!(a.same_content(&b));

        let c = Note::new("Title", "Body").with_tags(["y"]);
        assert_ne!(a.content_hash(), c.content_hash());
    }

    #[test]
    fn test_content_hash_field_boundaries() {
        let a = Note::new("ab", "c");
        let b = Note::new("a", "bc");
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_short_id() {
        let note = Note::new("t", "b").with_id("0123456789abcdef");
        assert_eq!(note.short_id(), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(
            parse_tags("work, important,  python ,,"),
            vec!["work", "important", "python"]
        );
        assert!(parse_tags("").is_empty());
        assert!(parse_tags(" , ").is_empty());
    }

    #[test]
    fn test_has_tag_case_insensitive() {
        let note = Note::new("t", "b").with_tags(["Work"]);
        assert!(note.has_tag("work"));
        assert!(!note.has_tag("home"));
    }

    #[test]
    fn test_matches_lowercase() {
        let note = Note::new("Shopping", "Milk and bread").with_tags(["Errands"]);
        assert!(note.matches_lowercase("milk"));
        assert!(note.matches_lowercase("shop"));
        assert!(note.matches_lowercase("errand"));
        assert!(!note.matches_lowercase("python"));
    }

    #[test]
    fn test_with_version_never_zero() {
        assert_eq!(Note::new("t", "b").with_version(0).version, 1);
    }

    #[test]
    fn test_note_serialization_field_names() {
        let note = Note::new("Title", "Body");
        let json = serde_json::to_value(&note).unwrap();

        for key in ["id", "title", "body", "tags", "pinned", "deleted", "last_modified", "version"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn test_deserialize_minimal_legacy_note() {
        let json = r#"{
            "id": "abc",
            "title": "Old",
            "body": "text",
            "last_modified": "2024-03-01T10:00:00.123456+00:00"
        }"#;
        let note: Note = serde_json::from_str(json).unwrap();

        assert_eq!(note.id, "abc");
        assert_eq!(note.version, 1);
        assert!(note.tags.is_empty());
        assert!(!note.deleted);
        assert!(!note.pinned);
        assert_eq!(note.last_modified.to_rfc3339(), "2024-03-01T10:00:00.123456+00:00");
    }
}
