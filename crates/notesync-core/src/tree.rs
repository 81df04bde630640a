//! LocalTree: where notebooks and notes live under the sync root.
//!
//! Layout:
//! ```text
//! <root>/
//!   .config/cache/<notebook>/<title>.mtime
//!   <notebook>/<title>          plain text
//!   <notebook>/src/<title>      raw remote body
//! ```

use crate::filter;
use crate::fs::{FileSystem, FsError, Result};
use crate::model::is_usable_name;

/// Reserved directory for daemon state, never synced.
pub const CONFIG_DIR: &str = ".config";
/// Per-notebook cache directories live here.
pub const CACHE_DIR: &str = ".config/cache";
/// Raw remote bodies, one per note, inside each notebook directory.
pub const RAW_DIR: &str = "src";

/// Path of a notebook directory.
pub fn notebook_path(notebook: &str) -> String {
    notebook.to_string()
}

/// Path of a note's plain-text file.
pub fn note_path(notebook: &str, filename: &str) -> String {
    format!("{notebook}/{filename}")
}

/// Path of a note's raw remote body.
pub fn raw_path(notebook: &str, filename: &str) -> String {
    format!("{notebook}/{RAW_DIR}/{filename}")
}

/// Trim separators so `/Personal/` and `Personal` compare equal.
pub fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

/// Whether `path` names something directly under the root.
pub fn is_top_level(path: &str) -> bool {
    let path = normalize(path);
    !path.is_empty() && !path.contains('/')
}

/// Split a path into (parent directory name, file name).
///
/// The parent is the last component of the containing directory, empty for
/// entries directly under the root.
pub fn split(path: &str) -> Option<(&str, &str)> {
    let path = normalize(path);
    if path.is_empty() {
        return None;
    }
    match path.rsplit_once('/') {
        Some((dir, name)) => {
            let parent = dir.rsplit('/').next().unwrap_or(dir);
            Some((parent, name))
        }
        None => Some(("", path)),
    }
}

/// Filesystem operations on the sync root in terms of notebooks and notes.
pub struct LocalTree<F> {
    fs: F,
}

impl<F: FileSystem> LocalTree<F> {
    pub fn new(fs: F) -> Self {
        Self { fs }
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Create the reserved config and cache directories.
    pub async fn ensure_layout(&self) -> Result<()> {
        self.fs.mkdir(CACHE_DIR).await
    }

    pub async fn notebook_exists(&self, notebook: &str) -> Result<bool> {
        self.fs.is_dir(&notebook_path(notebook)).await
    }

    /// Create a notebook directory and its raw-source subdirectory.
    pub async fn ensure_notebook(&self, notebook: &str) -> Result<()> {
        self.fs.mkdir(&format!("{notebook}/{RAW_DIR}")).await
    }

    /// Top-level directories that could be notebooks (hidden ones excluded).
    pub async fn notebook_dirs(&self) -> Result<Vec<String>> {
        let mut dirs: Vec<String> = self
            .fs
            .list("")
            .await?
            .into_iter()
            .filter(|entry| entry.is_dir && !entry.name.starts_with('.'))
            .map(|entry| entry.name)
            .collect();
        dirs.sort();
        Ok(dirs)
    }

    /// Plain-text note files directly inside a notebook, sorted.
    pub async fn note_files(&self, notebook: &str) -> Result<Vec<String>> {
        let mut files: Vec<String> = self
            .fs
            .list(&notebook_path(notebook))
            .await?
            .into_iter()
            .filter(|entry| !entry.is_dir && is_usable_name(&entry.name))
            .filter(|entry| !filter::is_excluded(&note_path(notebook, &entry.name)))
            .map(|entry| entry.name)
            .collect();
        files.sort();
        Ok(files)
    }

    pub async fn write_raw(&self, notebook: &str, filename: &str, body: &str) -> Result<()> {
        self.fs
            .write(&raw_path(notebook, filename), body.as_bytes())
            .await
    }

    pub async fn write_text(&self, notebook: &str, filename: &str, text: &str) -> Result<()> {
        self.fs
            .write(&note_path(notebook, filename), text.as_bytes())
            .await
    }

    /// Read a local note file.
    pub async fn read_text(&self, path: &str) -> Result<String> {
        self.fs.read_to_string(normalize(path)).await
    }

    /// Remove a note's raw body. A missing file is not an error.
    pub async fn remove_raw(&self, notebook: &str, filename: &str) -> Result<()> {
        match self.fs.delete(&raw_path(notebook, filename)).await {
            Ok(()) | Err(FsError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn is_dir(&self, path: &str) -> Result<bool> {
        self.fs.is_dir(normalize(path)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    #[test]
    fn test_split() {
        assert_eq!(split("Personal/Shopping List"), Some(("Personal", "Shopping List")));
        assert_eq!(split("/Personal/Shopping List"), Some(("Personal", "Shopping List")));
        assert_eq!(split("a/b/c"), Some(("b", "c")));
        assert_eq!(split("Work"), Some(("", "Work")));
        assert_eq!(split(""), None);
    }

    #[test]
    fn test_top_level() {
        assert!(is_top_level("Work"));
        assert!(is_top_level("/Work/"));
        assert!(!is_top_level("Work/note"));
        assert!(!is_top_level(""));
    }

    #[test]
    fn test_paths() {
        assert_eq!(note_path("Personal", "Todo"), "Personal/Todo");
        assert_eq!(raw_path("Personal", "Todo"), "Personal/src/Todo");
    }

    #[tokio::test]
    async fn test_ensure_notebook_creates_raw_dir() {
        let tree = LocalTree::new(InMemoryFs::new());
        tree.ensure_layout().await.unwrap();
        tree.ensure_notebook("Personal").await.unwrap();

        assert!(tree.notebook_exists("Personal").await.unwrap());
        assert!(tree.is_dir("Personal/src").await.unwrap());
        assert_eq!(tree.notebook_dirs().await.unwrap(), vec!["Personal"]);
    }

    #[tokio::test]
    async fn test_write_and_read_note() {
        let tree = LocalTree::new(InMemoryFs::new());
        tree.write_raw("Personal", "Todo", "<en-note/>").await.unwrap();
        tree.write_text("Personal", "Todo", "milk\n").await.unwrap();

        assert_eq!(tree.read_text("Personal/Todo").await.unwrap(), "milk\n");
        assert_eq!(
            tree.fs().read_to_string("Personal/src/Todo").await.unwrap(),
            "<en-note/>"
        );

        tree.remove_raw("Personal", "Todo").await.unwrap();
        tree.remove_raw("Personal", "Todo").await.unwrap();
        assert!(!tree.fs().exists("Personal/src/Todo").await.unwrap());
    }

    #[tokio::test]
    async fn test_note_files_skips_dirs_and_swap_files() {
        let tree = LocalTree::new(InMemoryFs::new());
        tree.ensure_notebook("Ideas").await.unwrap();
        tree.write_text("Ideas", "plan", "ship it\n").await.unwrap();
        tree.write_text("Ideas", "backlog", "later\n").await.unwrap();
        tree.write_text("Ideas", ".plan.swp", "swap").await.unwrap();
        tree.write_raw("Ideas", "plan", "<en-note/>").await.unwrap();

        assert_eq!(tree.note_files("Ideas").await.unwrap(), vec!["backlog", "plan"]);
    }
}
