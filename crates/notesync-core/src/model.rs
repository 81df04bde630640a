//! Remote entities mirrored by the local tree.

use serde::{Deserialize, Serialize};

/// Maximum title length, in characters, accepted by the remote service.
pub const MAX_TITLE_CHARS: usize = 100;

/// A named collection of notes. Maps 1:1 to a top-level directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notebook {
    /// Opaque remote identifier
    pub id: String,
    /// Unique name, also the directory name
    pub name: String,
}

/// A titled document living in exactly one notebook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Opaque remote identifier
    pub id: String,
    /// Title, at most [`MAX_TITLE_CHARS`] characters
    pub title: String,
    /// Owning notebook's id
    pub notebook_id: String,
    /// Rich-markup body. Empty when the note came from a listing.
    #[serde(default)]
    pub content: String,
    /// Last remote update, seconds since the Unix epoch
    pub updated_at: i64,
}

impl Note {
    /// The local filename for this note (the normalized title).
    pub fn filename(&self) -> String {
        normalize_title(&self.title)
    }
}

/// Truncate a title to the first [`MAX_TITLE_CHARS`] characters.
pub fn normalize_title(title: &str) -> String {
    match title.char_indices().nth(MAX_TITLE_CHARS) {
        Some((end, _)) => title[..end].to_string(),
        None => title.to_string(),
    }
}

/// Whether `name` can be used as a single path component inside the sync root.
///
/// Rejects empty names, `.`/`..`, names with a separator, and the reserved
/// config directory.
pub fn is_usable_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name != crate::tree::CONFIG_DIR
        && !name.contains('/')
        && !name.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_short_title_unchanged() {
        assert_eq!(normalize_title("Shopping List"), "Shopping List");
    }

    #[test]
    fn test_normalize_truncates_to_limit() {
        let long = "x".repeat(250);
        let normalized = normalize_title(&long);
        assert_eq!(normalized.chars().count(), MAX_TITLE_CHARS);
        assert_eq!(normalized, long[..MAX_TITLE_CHARS]);
    }

    #[test]
    fn test_normalize_counts_characters_not_bytes() {
        let long = "é".repeat(120);
        let normalized = normalize_title(&long);
        assert_eq!(normalized.chars().count(), MAX_TITLE_CHARS);
        assert!(long.starts_with(&normalized));
    }

    #[test]
    fn test_exactly_at_limit() {
        let title = "a".repeat(MAX_TITLE_CHARS);
        assert_eq!(normalize_title(&title), title);
    }

    #[test]
    fn test_usable_names() {
        assert!(is_usable_name("Personal"));
        assert!(is_usable_name("Work notes"));
        assert!(!is_usable_name(""));
        assert!(!is_usable_name(".."));
        assert!(!is_usable_name("a/b"));
        assert!(!is_usable_name(".config"));
    }
}
