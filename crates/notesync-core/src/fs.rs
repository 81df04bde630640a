//! FileSystem trait abstraction over the sync root.
//!
//! Implementations:
//! - `InMemoryFs` - For testing
//! - `NativeFs` (in notesync-daemon) - Uses tokio::fs
//!
//! Paths are relative to the sync root and `/`-separated. The empty path is
//! the root itself.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Is a directory: {0}")]
    IsDirectory(String),

    #[error("Invalid UTF-8 in {0}")]
    InvalidUtf8(String),

    #[error("IO error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, FsError>;

/// Directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// File or directory name (not full path)
    pub name: String,
    /// Whether this is a directory
    pub is_dir: bool,
}

/// Platform-independent filesystem abstraction.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Read file contents
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Write file contents (creates parent directories if needed)
    async fn write(&self, path: &str, content: &[u8]) -> Result<()>;

    /// List directory contents
    async fn list(&self, path: &str) -> Result<Vec<FileEntry>>;

    /// Delete a file
    async fn delete(&self, path: &str) -> Result<()>;

    /// Delete a directory and everything below it
    async fn remove_dir_all(&self, path: &str) -> Result<()>;

    /// Check if path exists
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Check if path exists and is a directory
    async fn is_dir(&self, path: &str) -> Result<bool>;

    /// Create directory (and parents if needed)
    async fn mkdir(&self, path: &str) -> Result<()>;

    /// Read a file as UTF-8 text
    async fn read_to_string(&self, path: &str) -> Result<String> {
        let bytes = self.read(path).await?;
        String::from_utf8(bytes).map_err(|_| FsError::InvalidUtf8(path.to_string()))
    }
}

/// In-memory filesystem for testing
#[derive(Default)]
pub struct InMemoryFs {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
    dirs: RwLock<BTreeSet<String>>,
}

impl InMemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files currently stored.
    pub fn file_count(&self) -> usize {
        self.files.read().unwrap().len()
    }

    fn normalize_path(path: &str) -> String {
        path.trim_matches('/').to_string()
    }

    fn parent_path(path: &str) -> Option<&str> {
        if path.is_empty() {
            None
        } else {
            Some(path.rfind('/').map_or("", |pos| &path[..pos]))
        }
    }

    fn is_below(candidate: &str, dir: &str) -> bool {
        dir.is_empty() || candidate.strip_prefix(dir).is_some_and(|r| r.starts_with('/'))
    }

    fn has_dir(&self, path: &str) -> bool {
        path.is_empty() || self.dirs.read().unwrap().contains(path)
    }
}

#[async_trait]
impl FileSystem for InMemoryFs {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let path = Self::normalize_path(path);
        if self.has_dir(&path) {
            return Err(FsError::IsDirectory(path));
        }
        let files = self.files.read().unwrap();
        files.get(&path).cloned().ok_or(FsError::NotFound(path))
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        let path = Self::normalize_path(path);
        if self.has_dir(&path) {
            return Err(FsError::IsDirectory(path));
        }

        // Create parent directories
        if let Some(parent) = Self::parent_path(&path) {
            self.mkdir(parent).await?;
        }

        let mut files = self.files.write().unwrap();
        files.insert(path, content.to_vec());
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<Vec<FileEntry>> {
        let path = Self::normalize_path(path);
        if !self.has_dir(&path) {
            return Err(FsError::NotFound(path));
        }

        let direct_child = |candidate: &str| -> Option<String> {
            if candidate.is_empty() || !Self::is_below(candidate, &path) {
                return None;
            }
            let rest = if path.is_empty() {
                candidate
            } else {
                &candidate[path.len() + 1..]
            };
            (!rest.contains('/')).then(|| rest.to_string())
        };

        let mut entries = Vec::new();
        for dir in self.dirs.read().unwrap().iter() {
            if let Some(name) = direct_child(dir) {
                entries.push(FileEntry { name, is_dir: true });
            }
        }
        for file in self.files.read().unwrap().keys() {
            if let Some(name) = direct_child(file) {
                entries.push(FileEntry { name, is_dir: false });
            }
        }
        Ok(entries)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let path = Self::normalize_path(path);
        if self.has_dir(&path) {
            return Err(FsError::IsDirectory(path));
        }
        let mut files = self.files.write().unwrap();
        files
            .remove(&path)
            .map(|_| ())
            .ok_or(FsError::NotFound(path))
    }

    async fn remove_dir_all(&self, path: &str) -> Result<()> {
        let path = Self::normalize_path(path);
        if path.is_empty() || !self.has_dir(&path) {
            return Err(FsError::NotFound(path));
        }
        self.files
            .write()
            .unwrap()
            .retain(|file, _| !Self::is_below(file, &path));
        self.dirs
            .write()
            .unwrap()
            .retain(|dir| *dir != path && !Self::is_below(dir, &path));
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let path = Self::normalize_path(path);
        Ok(self.has_dir(&path) || self.files.read().unwrap().contains_key(&path))
    }

    async fn is_dir(&self, path: &str) -> Result<bool> {
        Ok(self.has_dir(&Self::normalize_path(path)))
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        let path = Self::normalize_path(path);
        let mut dirs = self.dirs.write().unwrap();
        let mut current = path.as_str();
        while !current.is_empty() {
            dirs.insert(current.to_string());
            current = Self::parent_path(current).unwrap_or("");
        }
        Ok(())
    }
}

// Implement FileSystem for Arc<T> where T: FileSystem
// This lets tests keep a handle on the filesystem the engine owns
#[async_trait]
impl<T: FileSystem + ?Sized> FileSystem for std::sync::Arc<T> {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        (**self).read(path).await
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        (**self).write(path, content).await
    }

    async fn list(&self, path: &str) -> Result<Vec<FileEntry>> {
        (**self).list(path).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        (**self).delete(path).await
    }

    async fn remove_dir_all(&self, path: &str) -> Result<()> {
        (**self).remove_dir_all(path).await
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        (**self).exists(path).await
    }

    async fn is_dir(&self, path: &str) -> Result<bool> {
        (**self).is_dir(path).await
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        (**self).mkdir(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_note_file_lifecycle() {
        let fs = InMemoryFs::new();

        fs.write("Personal/Shopping List", b"milk\n").await.unwrap();
        assert_eq!(
            fs.read_to_string("Personal/Shopping List").await.unwrap(),
            "milk\n"
        );
        assert!(fs.is_dir("Personal").await.unwrap());
        assert!(!fs.is_dir("Personal/Shopping List").await.unwrap());

        fs.delete("Personal/Shopping List").await.unwrap();
        assert!(!fs.exists("Personal/Shopping List").await.unwrap());
        assert!(fs.exists("Personal").await.unwrap());
        assert!(matches!(
            fs.delete("Personal/Shopping List").await,
            Err(FsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_listing_and_directory_reads() {
        let fs = InMemoryFs::new();
        fs.write("Work/src/Ideas", b"<en-note/>").await.unwrap();
        fs.write("Work/Ideas", b"ship it").await.unwrap();

        let mut entries = fs.list("Work").await.unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(
            entries,
            vec![
                FileEntry {
                    name: "Ideas".into(),
                    is_dir: false
                },
                FileEntry {
                    name: "src".into(),
                    is_dir: true
                },
            ]
        );

        assert!(matches!(fs.read("Work/src").await, Err(FsError::IsDirectory(_))));
        assert!(matches!(fs.list("Archive").await, Err(FsError::NotFound(_))));
        assert!(matches!(
            fs.read_to_string("Missing").await,
            Err(FsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_inmemory_fs_remove_dir_all() {
        let fs = InMemoryFs::new();
        fs.write("nb/one", b"1").await.unwrap();
        fs.write("nb/src/one", b"1").await.unwrap();
        fs.write("nbx/keep", b"k").await.unwrap();

        fs.remove_dir_all("nb").await.unwrap();

        assert!(!fs.exists("nb").await.unwrap());
        assert!(!fs.exists("nb/src/one").await.unwrap());
        assert!(fs.exists("nbx/keep").await.unwrap());
        assert_eq!(fs.file_count(), 1);
    }

    #[tokio::test]
    async fn test_list_root() {
        let fs = InMemoryFs::new();
        fs.mkdir("Personal/src").await.unwrap();
        fs.write("top.txt", b"").await.unwrap();

        let mut names: Vec<_> = fs
            .list("")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["Personal", "top.txt"]);
    }
}
