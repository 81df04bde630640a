//! SyncCache: last-synchronized timestamps, one small file per note.
//!
//! Entries live at `.config/cache/<notebook>/<filename>.mtime` and hold a
//! decimal Unix timestamp followed by a newline. A missing or unreadable
//! entry means the note was never synchronized.

use crate::fs::{FileSystem, FsError, Result};
use crate::tree::CACHE_DIR;
use tracing::debug;

const ENTRY_SUFFIX: &str = ".mtime";

pub struct SyncCache<F> {
    fs: F,
}

impl<F: FileSystem> SyncCache<F> {
    pub fn new(fs: F) -> Self {
        Self { fs }
    }

    /// Cache directory for one notebook.
    pub fn notebook_dir(notebook: &str) -> String {
        format!("{CACHE_DIR}/{notebook}")
    }

    /// Cache entry path for one note file.
    pub fn entry_path(notebook: &str, filename: &str) -> String {
        format!("{CACHE_DIR}/{notebook}/{filename}{ENTRY_SUFFIX}")
    }

    pub async fn ensure_notebook(&self, notebook: &str) -> Result<()> {
        self.fs.mkdir(&Self::notebook_dir(notebook)).await
    }

    /// Last time the note file was synchronized, if ever.
    pub async fn get(&self, notebook: &str, filename: &str) -> Result<Option<i64>> {
        let path = Self::entry_path(notebook, filename);
        let content = match self.fs.read_to_string(&path).await {
            Ok(content) => content,
            Err(FsError::NotFound(_)) => return Ok(None),
            Err(FsError::InvalidUtf8(_)) => {
                debug!("Ignoring unreadable cache entry {}", path);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match content.lines().next().map(str::trim).map(str::parse::<i64>) {
            Some(Ok(timestamp)) => Ok(Some(timestamp)),
            _ => {
                debug!("Ignoring malformed cache entry {}", path);
                Ok(None)
            }
        }
    }

    /// Record that the note file was synchronized at `timestamp`.
    pub async fn put(&self, notebook: &str, filename: &str, timestamp: i64) -> Result<()> {
        let path = Self::entry_path(notebook, filename);
        self.fs.write(&path, format!("{timestamp}\n").as_bytes()).await
    }

    /// Forget one note. A missing entry is not an error.
    pub async fn remove(&self, notebook: &str, filename: &str) -> Result<()> {
        match self.fs.delete(&Self::entry_path(notebook, filename)).await {
            Ok(()) | Err(FsError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Forget every note of a notebook.
    pub async fn remove_notebook(&self, notebook: &str) -> Result<()> {
        match self.fs.remove_dir_all(&Self::notebook_dir(notebook)).await {
            Ok(()) | Err(FsError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
