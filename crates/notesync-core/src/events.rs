//! Local change events produced by the watcher and consumed by the engine.

use std::fmt;

/// A single filesystem change under the sync root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    /// Path relative to the sync root
    pub path: String,
    /// Type of event
    pub kind: FileEventKind,
}

impl FileEvent {
    pub fn new(kind: FileEventKind, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn created(path: impl Into<String>) -> Self {
        Self::new(FileEventKind::Created, path)
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        Self::new(FileEventKind::Deleted, path)
    }

    pub fn modified(path: impl Into<String>) -> Self {
        Self::new(FileEventKind::Modified, path)
    }
}

/// Type of file event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    Created,
    Deleted,
    Modified,
}

impl fmt::Display for FileEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileEventKind::Created => "create",
            FileEventKind::Deleted => "delete",
            FileEventKind::Modified => "modify",
        };
        f.write_str(name)
    }
}
