//! File-backed remote store.
//!
//! Keeps notebooks and notes in a `MemoryStore` and writes them to a JSON
//! file after every successful mutation. Lets the daemon run against a local
//! stand-in for the note service.

use anyhow::{Context, Result};
use async_trait::async_trait;
use notesync_core::remote::{self, MemoryStore, RemoteError, RemoteStore, StoreSnapshot};
use notesync_core::{Note, Notebook};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct SnapshotStore {
    /// Path to the snapshot file.
    path: PathBuf,
    store: MemoryStore,
}

impl SnapshotStore {
    /// Open the snapshot at `path`, starting empty if it does not exist yet.
    pub fn open(path: PathBuf) -> Result<Self> {
        let snapshot = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("reading remote snapshot {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("parsing remote snapshot {}", path.display()))?
        } else {
            StoreSnapshot::default()
        };

        Ok(Self {
            path,
            store: MemoryStore::from_snapshot(snapshot),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.store.snapshot()
    }

    /// Write current contents to disk.
    fn save(&self) -> remote::Result<()> {
        let write = || -> Result<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            let contents = serde_json::to_string_pretty(&self.store.snapshot())?;
            fs::write(&self.path, contents)?;
            Ok(())
        };
        write().map_err(|e| RemoteError::Unavailable(format!("saving snapshot: {e}")))?;
        debug!("Saved remote snapshot to {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for SnapshotStore {
    async fn check_version(&self) -> remote::Result<bool> {
        self.store.check_version().await
    }

    async fn list_notebooks(&self) -> remote::Result<Vec<Notebook>> {
        self.store.list_notebooks().await
    }

    async fn list_notes_by_notebook(&self, notebook_id: &str) -> remote::Result<Vec<Note>> {
        self.store.list_notes_by_notebook(notebook_id).await
    }

    async fn get_note_content(&self, note_id: &str) -> remote::Result<String> {
        self.store.get_note_content(note_id).await
    }

    async fn create_notebook(&self, name: &str) -> remote::Result<Notebook> {
        let notebook = self.store.create_notebook(name).await?;
        self.save()?;
        Ok(notebook)
    }

    async fn expunge_notebook(&self, notebook_id: &str) -> remote::Result<()> {
        self.store.expunge_notebook(notebook_id).await?;
        self.save()
    }

    async fn create_note(
        &self,
        title: &str,
        content: &str,
        notebook_id: &str,
    ) -> remote::Result<Note> {
        let note = self.store.create_note(title, content, notebook_id).await?;
        self.save()?;
        Ok(note)
    }

    async fn update_note(&self, note: &Note) -> remote::Result<Note> {
        let stored = self.store.update_note(note).await?;
        self.save()?;
        Ok(stored)
    }

    async fn delete_note(&self, note_id: &str) -> remote::Result<()> {
        self.store.delete_note(note_id).await?;
        self.save()
    }
}
