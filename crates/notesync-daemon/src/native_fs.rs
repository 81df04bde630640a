//! Native filesystem implementation using tokio::fs.

use async_trait::async_trait;
use notesync_core::fs::{FileEntry, FileSystem, FsError, Result};
use std::io;
use std::path::PathBuf;
use tokio::fs;

/// Native filesystem rooted at the sync directory
#[derive(Debug, Clone)]
pub struct NativeFs {
    base_path: PathBuf,
}

impl NativeFs {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        let path = path.trim_matches('/');
        if path.is_empty() {
            self.base_path.clone()
        } else {
            self.base_path.join(path)
        }
    }
}

fn io_error(path: &str) -> impl FnOnce(io::Error) -> FsError + '_ {
    move |e| match e.kind() {
        io::ErrorKind::NotFound => FsError::NotFound(path.to_string()),
        io::ErrorKind::IsADirectory => FsError::IsDirectory(path.to_string()),
        _ => FsError::Io(format!("{path}: {e}")),
    }
}

#[async_trait]
impl FileSystem for NativeFs {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(path);
        if full_path.is_dir() {
            return Err(FsError::IsDirectory(path.to_string()));
        }
        fs::read(&full_path).await.map_err(io_error(path))
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        let full_path = self.full_path(path);

        // Create parent directories if needed
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(io_error(path))?;
        }

        fs::write(&full_path, content).await.map_err(io_error(path))
    }

    async fn list(&self, path: &str) -> Result<Vec<FileEntry>> {
        let full_path = self.full_path(path);
        let mut entries = Vec::new();

        let mut dir = fs::read_dir(&full_path).await.map_err(io_error(path))?;
        while let Some(entry) = dir.next_entry().await.map_err(io_error(path))? {
            let name = entry.file_name().to_string_lossy().to_string();
            let file_type = entry.file_type().await.map_err(io_error(path))?;

            entries.push(FileEntry {
                name,
                is_dir: file_type.is_dir(),
            });
        }

        Ok(entries)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.full_path(path);
        if full_path.is_dir() {
            return Err(FsError::IsDirectory(path.to_string()));
        }
        fs::remove_file(&full_path).await.map_err(io_error(path))
    }

    async fn remove_dir_all(&self, path: &str) -> Result<()> {
        if path.trim_matches('/').is_empty() {
            return Err(FsError::Io("refusing to remove the sync root".into()));
        }
        fs::remove_dir_all(self.full_path(path))
            .await
            .map_err(io_error(path))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        fs::try_exists(self.full_path(path))
            .await
            .map_err(io_error(path))
    }

    async fn is_dir(&self, path: &str) -> Result<bool> {
        match fs::metadata(self.full_path(path)).await {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(path)(e)),
        }
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        fs::create_dir_all(self.full_path(path))
            .await
            .map_err(io_error(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_native_fs_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let fs = NativeFs::new(temp_dir.path().to_path_buf());

        fs.write("Personal/Shopping List", b"milk\n").await.unwrap();

        assert!(fs.is_dir("Personal").await.unwrap());
        assert!(!fs.is_dir("Personal/Shopping List").await.unwrap());
        assert_eq!(
            fs.read_to_string("Personal/Shopping List").await.unwrap(),
            "milk\n"
        );

        let entries = fs.list("").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Personal");
        assert!(entries[0].is_dir);
    }

    #[tokio::test]
    async fn test_native_fs_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let fs = NativeFs::new(temp_dir.path().to_path_buf());

        assert!(matches!(fs.read("missing").await, Err(FsError::NotFound(_))));
        assert!(matches!(fs.delete("missing").await, Err(FsError::NotFound(_))));
        assert!(!fs.exists("missing").await.unwrap());
        assert!(!fs.is_dir("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_native_fs_directories() {
        let temp_dir = TempDir::new().unwrap();
        let fs = NativeFs::new(temp_dir.path().to_path_buf());

        fs.mkdir("Work/src").await.unwrap();
        fs.write("Work/src/Plan", b"raw").await.unwrap();
        assert!(matches!(fs.delete("Work").await, Err(FsError::IsDirectory(_))));

        fs.remove_dir_all("Work").await.unwrap();
        assert!(!fs.exists("Work").await.unwrap());
        assert!(fs.remove_dir_all("").await.is_err());
    }
}
