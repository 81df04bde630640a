//! RemoteStore trait: the note service as seen by the engine.
//!
//! Implementations:
//! - `MemoryStore` - In-process store, used for testing
//! - `SnapshotStore` (in notesync-daemon) - `MemoryStore` persisted as JSON
//!
//! Create operations are not idempotent: calling `create_notebook` twice with
//! the same name yields two notebooks. Callers check their index first.

use crate::engine::unix_now;
use crate::model::{normalize_title, Note, Notebook};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rejected by remote: {0}")]
    Rejected(String),

    #[error("Remote unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, RemoteError>;

/// Remote note service.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Whether the service speaks a protocol version we understand
    async fn check_version(&self) -> Result<bool>;

    async fn list_notebooks(&self) -> Result<Vec<Notebook>>;

    /// All notes of a notebook, without content
    async fn list_notes_by_notebook(&self, notebook_id: &str) -> Result<Vec<Note>>;

    /// Full markup body of a note
    async fn get_note_content(&self, note_id: &str) -> Result<String>;

    async fn create_notebook(&self, name: &str) -> Result<Notebook>;

    /// Permanently delete a notebook and its notes
    async fn expunge_notebook(&self, notebook_id: &str) -> Result<()>;

    async fn create_note(&self, title: &str, content: &str, notebook_id: &str) -> Result<Note>;

    /// Replace a note's title and content; returns the stored note
    async fn update_note(&self, note: &Note) -> Result<Note>;

    async fn delete_note(&self, note_id: &str) -> Result<()>;
}

#[async_trait]
impl<T: RemoteStore + ?Sized> RemoteStore for std::sync::Arc<T> {
    async fn check_version(&self) -> Result<bool> {
        (**self).check_version().await
    }

    async fn list_notebooks(&self) -> Result<Vec<Notebook>> {
        (**self).list_notebooks().await
    }

    async fn list_notes_by_notebook(&self, notebook_id: &str) -> Result<Vec<Note>> {
        (**self).list_notes_by_notebook(notebook_id).await
    }

    async fn get_note_content(&self, note_id: &str) -> Result<String> {
        (**self).get_note_content(note_id).await
    }

    async fn create_notebook(&self, name: &str) -> Result<Notebook> {
        (**self).create_notebook(name).await
    }

    async fn expunge_notebook(&self, notebook_id: &str) -> Result<()> {
        (**self).expunge_notebook(notebook_id).await
    }

    async fn create_note(&self, title: &str, content: &str, notebook_id: &str) -> Result<Note> {
        (**self).create_note(title, content, notebook_id).await
    }

    async fn update_note(&self, note: &Note) -> Result<Note> {
        (**self).update_note(note).await
    }

    async fn delete_note(&self, note_id: &str) -> Result<()> {
        (**self).delete_note(note_id).await
    }
}

/// Remote operations, as recorded by `MemoryStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CheckVersion,
    ListNotebooks,
    ListNotes,
    GetNoteContent,
    CreateNotebook,
    ExpungeNotebook,
    CreateNote,
    UpdateNote,
    DeleteNote,
}

impl Operation {
    /// Whether the operation changes remote state.
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            Operation::CreateNotebook
                | Operation::ExpungeNotebook
                | Operation::CreateNote
                | Operation::UpdateNote
                | Operation::DeleteNote
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::CheckVersion => "check_version",
            Operation::ListNotebooks => "list_notebooks",
            Operation::ListNotes => "list_notes_by_notebook",
            Operation::GetNoteContent => "get_note_content",
            Operation::CreateNotebook => "create_notebook",
            Operation::ExpungeNotebook => "expunge_notebook",
            Operation::CreateNote => "create_note",
            Operation::UpdateNote => "update_note",
            Operation::DeleteNote => "delete_note",
        };
        f.write_str(name)
    }
}

/// Serializable contents of a `MemoryStore`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub notebooks: Vec<Notebook>,
    pub notes: Vec<Note>,
}

struct Inner {
    data: StoreSnapshot,
    log: Vec<Operation>,
    failing: HashSet<Operation>,
    version_ok: bool,
}

/// In-process remote store.
///
/// Records every operation it serves and can be told to fail specific ones.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::from_snapshot(StoreSnapshot::default())
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(data: StoreSnapshot) -> Self {
        Self {
            inner: Mutex::new(Inner {
                data,
                log: Vec::new(),
                failing: HashSet::new(),
                version_ok: true,
            }),
        }
    }

    /// Copy of the stored notebooks and notes.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.lock().unwrap().data.clone()
    }

    /// Seed a notebook without recording an operation.
    pub fn insert_notebook(&self, name: &str) -> Notebook {
        let notebook = Notebook {
            id: new_id(),
            name: name.to_string(),
        };
        self.inner
            .lock()
            .unwrap()
            .data
            .notebooks
            .push(notebook.clone());
        notebook
    }

    /// Seed a note without recording an operation.
    pub fn insert_note(&self, notebook_id: &str, title: &str, content: &str, updated_at: i64) -> Note {
        let note = Note {
            id: new_id(),
            title: title.to_string(),
            notebook_id: notebook_id.to_string(),
            content: content.to_string(),
            updated_at,
        };
        self.inner.lock().unwrap().data.notes.push(note.clone());
        note
    }

    /// Simulate a remote-side edit. Returns false if the note is unknown.
    pub fn edit_note(&self, note_id: &str, content: &str, updated_at: i64) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.data.notes.iter_mut().find(|n| n.id == note_id) {
            Some(note) => {
                note.content = content.to_string();
                note.updated_at = updated_at;
                true
            }
            None => false,
        }
    }

    pub fn notebooks(&self) -> Vec<Notebook> {
        self.inner.lock().unwrap().data.notebooks.clone()
    }

    pub fn notes(&self) -> Vec<Note> {
        self.inner.lock().unwrap().data.notes.clone()
    }

    pub fn note(&self, note_id: &str) -> Option<Note> {
        let inner = self.inner.lock().unwrap();
        inner.data.notes.iter().find(|n| n.id == note_id).cloned()
    }

    /// Operations served so far, in order.
    pub fn operations(&self) -> Vec<Operation> {
        self.inner.lock().unwrap().log.clone()
    }

    /// Operations that changed remote state.
    pub fn mutations(&self) -> Vec<Operation> {
        self.operations()
            .into_iter()
            .filter(|op| op.is_mutation())
            .collect()
    }

    pub fn clear_operations(&self) {
        self.inner.lock().unwrap().log.clear();
    }

    /// Make every future call of `op` fail until `recover` is called.
    pub fn fail(&self, op: Operation) {
        self.inner.lock().unwrap().failing.insert(op);
    }

    pub fn recover(&self, op: Operation) {
        self.inner.lock().unwrap().failing.remove(&op);
    }

    pub fn set_version_ok(&self, ok: bool) {
        self.inner.lock().unwrap().version_ok = ok;
    }

    /// Record `op` and run `f` against the store, unless `op` is failing.
    fn serve<T>(&self, op: Operation, f: impl FnOnce(&mut Inner) -> Result<T>) -> Result<T> {
        let mut inner = self.inner.lock().unwrap();
        inner.log.push(op);
        if inner.failing.contains(&op) {
            return Err(RemoteError::Unavailable(format!("{op} failed")));
        }
        f(&mut *inner)
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn require_notebook(data: &StoreSnapshot, notebook_id: &str) -> Result<()> {
    if data.notebooks.iter().any(|nb| nb.id == notebook_id) {
        Ok(())
    } else {
        Err(RemoteError::NotFound(format!("notebook {notebook_id}")))
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn check_version(&self) -> Result<bool> {
        self.serve(Operation::CheckVersion, |inner| Ok(inner.version_ok))
    }

    async fn list_notebooks(&self) -> Result<Vec<Notebook>> {
        self.serve(Operation::ListNotebooks, |inner| {
            Ok(inner.data.notebooks.clone())
        })
    }

    async fn list_notes_by_notebook(&self, notebook_id: &str) -> Result<Vec<Note>> {
        self.serve(Operation::ListNotes, |inner| {
            require_notebook(&inner.data, notebook_id)?;
            Ok(inner
                .data
                .notes
                .iter()
                .filter(|n| n.notebook_id == notebook_id)
                .map(|n| Note {
                    content: String::new(),
                    ..n.clone()
                })
                .collect())
        })
    }

    async fn get_note_content(&self, note_id: &str) -> Result<String> {
        self.serve(Operation::GetNoteContent, |inner| {
            inner
                .data
                .notes
                .iter()
                .find(|n| n.id == note_id)
                .map(|n| n.content.clone())
                .ok_or_else(|| RemoteError::NotFound(format!("note {note_id}")))
        })
    }

    async fn create_notebook(&self, name: &str) -> Result<Notebook> {
        self.serve(Operation::CreateNotebook, |inner| {
            if name.is_empty() {
                return Err(RemoteError::Rejected("empty notebook name".into()));
            }
            let notebook = Notebook {
                id: new_id(),
                name: name.to_string(),
            };
            inner.data.notebooks.push(notebook.clone());
            Ok(notebook)
        })
    }

    async fn expunge_notebook(&self, notebook_id: &str) -> Result<()> {
        self.serve(Operation::ExpungeNotebook, |inner| {
            require_notebook(&inner.data, notebook_id)?;
            inner.data.notebooks.retain(|nb| nb.id != notebook_id);
            inner.data.notes.retain(|n| n.notebook_id != notebook_id);
            Ok(())
        })
    }

    async fn create_note(&self, title: &str, content: &str, notebook_id: &str) -> Result<Note> {
        self.serve(Operation::CreateNote, |inner| {
            require_notebook(&inner.data, notebook_id)?;
            let note = Note {
                id: new_id(),
                title: normalize_title(title),
                notebook_id: notebook_id.to_string(),
                content: content.to_string(),
                updated_at: unix_now(),
            };
            inner.data.notes.push(note.clone());
            Ok(note)
        })
    }

    async fn update_note(&self, note: &Note) -> Result<Note> {
        self.serve(Operation::UpdateNote, |inner| {
            let stored = inner
                .data
                .notes
                .iter_mut()
                .find(|n| n.id == note.id)
                .ok_or_else(|| RemoteError::NotFound(format!("note {}", note.id)))?;
            stored.title = normalize_title(&note.title);
            stored.content = note.content.clone();
            stored.updated_at = unix_now();
            Ok(stored.clone())
        })
    }

    async fn delete_note(&self, note_id: &str) -> Result<()> {
        self.serve(Operation::DeleteNote, |inner| {
            let before = inner.data.notes.len();
            inner.data.notes.retain(|n| n.id != note_id);
            if inner.data.notes.len() == before {
                return Err(RemoteError::NotFound(format!("note {note_id}")));
            }
            Ok(())
        })
    }
}
