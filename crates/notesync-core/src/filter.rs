//! Exclusion filter for filesystem events.
//!
//! Excluded paths are never turned into remote mutations: editor swap files,
//! anything inside the reserved config directory, and anything inside a
//! notebook's raw-source directory.

use crate::tree::{normalize, CONFIG_DIR, RAW_DIR};

const SWAP_SUFFIXES: &[&str] = &[".swp", ".swpx"];

/// Whether events for `path` (relative to the sync root) must be ignored.
pub fn is_excluded(path: &str) -> bool {
    let path = normalize(path);
    let mut components = path.split('/');

    if components.next() == Some(CONFIG_DIR) {
        return true;
    }
    if components.next() == Some(RAW_DIR) {
        return true;
    }
    is_swap_file(path)
}

fn is_swap_file(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    SWAP_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_excluded() {
        assert!(is_excluded(".config"));
        assert!(is_excluded(".config/cache/foo.mtime"));
        assert!(is_excluded(".config/cache/Personal/Shopping List.mtime"));
        assert!(is_excluded("/.config/notesync.log"));
    }

    #[test]
    fn test_raw_dir_excluded() {
        assert!(is_excluded("Personal/src"));
        assert!(is_excluded("Personal/src/Shopping List"));
    }

    #[test]
    fn test_swap_files_excluded() {
        assert!(is_excluded("Personal/.Shopping List.swp"));
        assert!(is_excluded("Personal/.Shopping List.swpx"));
        assert!(is_excluded("notes.swp"));
    }

    #[test]
    fn test_regular_paths_pass() {
        assert!(!is_excluded("Personal"));
        assert!(!is_excluded("Personal/Shopping List"));
        assert!(!is_excluded("src"));
        assert!(!is_excluded("Personal/swp notes"));
        assert!(!is_excluded("Personal/config"));
    }
}
