//! SyncEngine: keeps the local tree and the remote store in lockstep.
//!
//! Two phases:
//!
//! 1. `reconcile_all` pulls remote truth at startup. A note is fetched and
//!    materialized when it has no cache entry, or when its remote
//!    `updated_at` is not older than the cached last-sync time. Everything
//!    else is skipped, so a second pass with no remote changes does nothing.
//! 2. `handle_event` turns one local change at a time into remote mutations,
//!    keeping the in-memory index in step.
//!
//! Remote and local I/O failures on a single notebook or note are logged and
//! skipped; the index and cache stay untouched so the next pass retries.

use crate::cache::SyncCache;
use crate::events::{FileEvent, FileEventKind};
use crate::filter;
use crate::fs::{FileSystem, FsError};
use crate::model::{is_usable_name, normalize_title, Note, Notebook};
use crate::notifier::{NoopNotifier, Notifier};
use crate::remote::{RemoteError, RemoteStore};
use crate::state::SyncState;
use crate::transcode::{self, TranscodeError};
use crate::tree::{self, LocalTree};

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Remote API version mismatch")]
    VersionMismatch,

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Filesystem error: {0}")]
    Fs(#[from] FsError),

    #[error("Transcode error: {0}")]
    Transcode(#[from] TranscodeError),
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Report from a reconciliation pass
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Notebook directories created locally
    pub created_dirs: Vec<String>,
    /// Notes fetched and written (`notebook/title`)
    pub materialized: Vec<String>,
    /// Notes whose local copy was already current
    pub up_to_date: Vec<String>,
    /// Local-only directories pushed as new notebooks
    pub adopted: Vec<String>,
    /// Files of adopted directories pushed as new notes
    pub pushed: Vec<String>,
    /// Notebooks or notes that could not be used as local names
    pub skipped: Vec<String>,
    /// Notebooks or notes that failed and will be retried next pass
    pub failed: Vec<String>,
}

impl ReconcileReport {
    /// Check if any local or remote changes were made
    pub fn has_changes(&self) -> bool {
        !self.created_dirs.is_empty()
            || !self.materialized.is_empty()
            || !self.adopted.is_empty()
            || !self.pushed.is_empty()
    }
}

/// A change applied to the remote store in response to a local event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    NotebookCreated { notebook: String },
    NotebookDeleted { notebook: String },
    NoteCreated { notebook: String, title: String },
    NoteUpdated { notebook: String, title: String },
    NoteDeleted { notebook: String, title: String },
}

impl fmt::Display for Applied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Applied::NotebookCreated { notebook } => write!(f, "Notebook \"{notebook}\" created"),
            Applied::NotebookDeleted { notebook } => write!(f, "Notebook \"{notebook}\" deleted"),
            Applied::NoteCreated { notebook, title } => {
                write!(f, "Note \"{notebook}/{title}\" created")
            }
            Applied::NoteUpdated { notebook, title } => {
                write!(f, "Note \"{notebook}/{title}\" updated")
            }
            Applied::NoteDeleted { notebook, title } => {
                write!(f, "Note \"{notebook}/{title}\" deleted")
            }
        }
    }
}

/// Outcome of synchronizing one remote note during reconciliation.
enum NoteSync {
    Materialized,
    UpToDate,
    Skipped,
}

/// Current wall-clock time in seconds since the Unix epoch.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub struct SyncEngine<R, F, N = NoopNotifier> {
    remote: R,
    tree: LocalTree<F>,
    cache: SyncCache<F>,
    notifier: N,
    state: SyncState,
    clock: fn() -> i64,
}

impl<R: RemoteStore, F: FileSystem + Clone> SyncEngine<R, F, NoopNotifier> {
    pub fn new(remote: R, fs: F) -> Self {
        Self {
            remote,
            tree: LocalTree::new(fs.clone()),
            cache: SyncCache::new(fs),
            notifier: NoopNotifier,
            state: SyncState::new(),
            clock: unix_now,
        }
    }
}

impl<R: RemoteStore, F: FileSystem, N: Notifier> SyncEngine<R, F, N> {
    /// Replace the notifier used for successful local-to-remote changes.
    pub fn with_notifier<M: Notifier>(self, notifier: M) -> SyncEngine<R, F, M> {
        SyncEngine {
            remote: self.remote,
            tree: self.tree,
            cache: self.cache,
            notifier,
            state: self.state,
            clock: self.clock,
        }
    }

    /// Replace the clock used for cache timestamps.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn tree(&self) -> &LocalTree<F> {
        &self.tree
    }

    /// Resolve a local path against the index.
    pub fn resolve_path(&self, path: &str) -> (Option<&Notebook>, Option<&Note>) {
        self.state.resolve_path(path)
    }

    /// Fail if the remote speaks a protocol version we do not understand.
    pub async fn check_remote_version(&self) -> Result<()> {
        if self.remote.check_version().await? {
            debug!("Remote version OK");
            Ok(())
        } else {
            Err(SyncError::VersionMismatch)
        }
    }

    /// Pull remote truth and materialize out-of-date notes locally.
    ///
    /// Rebuilds the index from the remote listing. Only a failure to create
    /// the local layout or to list notebooks aborts the pass.
    pub async fn reconcile_all(&mut self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        self.tree.ensure_layout().await?;

        let notebooks = self.remote.list_notebooks().await?;
        info!("Fetched {} notebook(s)", notebooks.len());

        let mut state = SyncState::new();
        for notebook in notebooks {
            if !is_usable_name(&notebook.name) {
                warn!("Skipping notebook with unusable name {:?}", notebook.name);
                report.skipped.push(notebook.name);
                continue;
            }
            if state.notebook_by_name(&notebook.name).is_some() {
                warn!("Skipping duplicate notebook {:?}", notebook.name);
                report.skipped.push(notebook.name);
                continue;
            }

            let notes = match self.reconcile_notebook(&notebook, &mut report).await {
                Ok(notes) => Some(notes),
                Err(e) => {
                    error!("Failed to sync notebook '{}': {}", notebook.name, e);
                    report.failed.push(notebook.name.clone());
                    None
                }
            };
            state.insert_notebook(notebook, notes);
        }
        self.state = state;

        self.adopt_local_notebooks(&mut report).await?;

        info!(
            "Reconciliation done: {} materialized, {} up to date, {} failed",
            report.materialized.len(),
            report.up_to_date.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Handle one local change. Failures are logged here and yield `None`.
    pub async fn handle_event(&mut self, event: &FileEvent) -> Option<Applied> {
        let result = match event.kind {
            FileEventKind::Created => self.on_local_create(&event.path).await,
            FileEventKind::Deleted => self.on_local_delete(&event.path).await,
            FileEventKind::Modified => self.on_local_modify(&event.path).await,
        };

        match result {
            Ok(Some(applied)) => {
                info!("{}", applied);
                self.notifier.notify(&applied.to_string());
                Some(applied)
            }
            Ok(None) => None,
            Err(e) => {
                error!("Failed to handle {} of '{}': {}", event.kind, event.path, e);
                None
            }
        }
    }

    /// A file or directory appeared locally.
    ///
    /// A new top-level directory becomes a notebook. A new file in a known
    /// notebook becomes a note, unless a note already resolves to it.
    pub async fn on_local_create(&mut self, path: &str) -> Result<Option<Applied>> {
        let path = tree::normalize(path);
        if filter::is_excluded(path) {
            return Ok(None);
        }
        debug!("File created: '{}'", path);

        if tree::is_top_level(path) && self.tree.is_dir(path).await? {
            if self.state.notebook_by_name(path).is_some() {
                debug!("'{}' is already a known notebook", path);
                return Ok(None);
            }
            if !is_usable_name(path) {
                return Ok(None);
            }
            self.create_notebook(path).await?;
            return Ok(Some(Applied::NotebookCreated {
                notebook: path.to_string(),
            }));
        }

        let (notebook, note) = self.state.resolve_path(path);
        let Some(notebook) = notebook.cloned() else {
            return Ok(None);
        };
        if note.is_some() {
            debug!("'{}' already maps to a note", path);
            return Ok(None);
        }
        if self.state.notes_in(&notebook.name).is_none() {
            warn!("Notes of '{}' are not loaded, not creating '{}'", notebook.name, path);
            return Ok(None);
        }
        if self.tree.is_dir(path).await? {
            return Ok(None);
        }
        let Some((_, filename)) = tree::split(path) else {
            return Ok(None);
        };

        let title = self.push_file(&notebook, path, filename).await?;
        Ok(Some(Applied::NoteCreated {
            notebook: notebook.name,
            title,
        }))
    }

    /// A file or directory disappeared locally.
    pub async fn on_local_delete(&mut self, path: &str) -> Result<Option<Applied>> {
        let path = tree::normalize(path);
        if filter::is_excluded(path) {
            return Ok(None);
        }
        debug!("File deleted: '{}'", path);

        if tree::is_top_level(path) {
            if let Some(notebook) = self.state.notebook_by_name(path).cloned() {
                self.remote.expunge_notebook(&notebook.id).await?;
                self.state.remove_notebook(&notebook.name);
                if let Err(e) = self.cache.remove_notebook(&notebook.name).await {
                    warn!("Failed to clear cache of '{}': {}", notebook.name, e);
                }
                return Ok(Some(Applied::NotebookDeleted {
                    notebook: notebook.name,
                }));
            }
        }

        let (Some(notebook), Some(note)) = self.state.resolve_path(path) else {
            return Ok(None);
        };
        let (notebook, note) = (notebook.clone(), note.clone());

        self.remote.delete_note(&note.id).await?;
        self.state.remove_note(&notebook.name, &note.id);

        let filename = note.filename();
        if let Err(e) = self.cache.remove(&notebook.name, &filename).await {
            warn!("Failed to clear cache of '{}/{}': {}", notebook.name, filename, e);
        }
        if let Err(e) = self.tree.remove_raw(&notebook.name, &filename).await {
            warn!("Failed to remove raw copy of '{}/{}': {}", notebook.name, filename, e);
        }

        Ok(Some(Applied::NoteDeleted {
            notebook: notebook.name,
            title: note.title,
        }))
    }

    /// A file changed locally. Pushes its content; identity is unchanged.
    pub async fn on_local_modify(&mut self, path: &str) -> Result<Option<Applied>> {
        let path = tree::normalize(path);
        if filter::is_excluded(path) {
            return Ok(None);
        }

        let (Some(notebook), Some(note)) = self.state.resolve_path(path) else {
            return Ok(None);
        };
        let (notebook, note) = (notebook.clone(), note.clone());
        if self.tree.is_dir(path).await? {
            return Ok(None);
        }

        let text = self.tree.read_text(path).await?;
        let updated = Note {
            title: normalize_title(&note.title),
            content: transcode::text_to_markup(&text),
            ..note
        };
        let stored = self.remote.update_note(&updated).await?;
        let title = stored.title.clone();
        self.state.replace_note(&notebook.name, stored);

        Ok(Some(Applied::NoteUpdated {
            notebook: notebook.name,
            title,
        }))
    }

    /// Create local directories for a notebook and sync its notes.
    async fn reconcile_notebook(
        &self,
        notebook: &Notebook,
        report: &mut ReconcileReport,
    ) -> Result<Vec<Note>> {
        if !self.tree.notebook_exists(&notebook.name).await? {
            info!("Creating notebook directory '{}'", notebook.name);
            report.created_dirs.push(notebook.name.clone());
        }
        self.tree.ensure_notebook(&notebook.name).await?;
        self.cache.ensure_notebook(&notebook.name).await?;

        let notes = self.remote.list_notes_by_notebook(&notebook.id).await?;
        for note in &notes {
            let label = format!("{}/{}", notebook.name, note.filename());
            match self.reconcile_note(&notebook.name, note).await {
                Ok(NoteSync::Materialized) => report.materialized.push(label),
                Ok(NoteSync::UpToDate) => report.up_to_date.push(label),
                Ok(NoteSync::Skipped) => report.skipped.push(label),
                Err(e) => {
                    error!("Failed to sync note '{}': {}", label, e);
                    report.failed.push(label);
                }
            }
        }
        Ok(notes)
    }

    async fn reconcile_note(&self, notebook: &str, note: &Note) -> Result<NoteSync> {
        let filename = note.filename();
        if !is_usable_name(&filename) {
            warn!("Skipping note with unusable title {:?} in '{}'", note.title, notebook);
            return Ok(NoteSync::Skipped);
        }

        let last_synced = self.cache.get(notebook, &filename).await?;
        let needs_update = last_synced.is_none_or(|synced| note.updated_at >= synced);
        if !needs_update {
            debug!("Note '{}/{}' is already up to date, skipped", notebook, filename);
            return Ok(NoteSync::UpToDate);
        }

        info!("Fetching note '{}/{}'", notebook, filename);
        let body = self.remote.get_note_content(&note.id).await?;
        self.tree.write_raw(notebook, &filename, &body).await?;

        let text = transcode::markup_to_text(transcode::strip_header(&body))?;
        self.tree
            .write_text(notebook, &filename, &format!("{text}\n"))
            .await?;
        self.cache.put(notebook, &filename, (self.clock)()).await?;

        Ok(NoteSync::Materialized)
    }

    /// Push top-level directories with no remote counterpart as notebooks.
    async fn adopt_local_notebooks(&mut self, report: &mut ReconcileReport) -> Result<()> {
        for dir in self.tree.notebook_dirs().await? {
            if self.state.notebook_by_name(&dir).is_some() || !is_usable_name(&dir) {
                continue;
            }
            match self.create_notebook(&dir).await {
                Ok(()) => {
                    info!("Adopted local directory '{}' as a notebook", dir);
                    self.push_local_notes(&dir, report).await;
                    report.adopted.push(dir);
                }
                Err(e) => {
                    error!("Could not create notebook '{}': {}", dir, e);
                    report.failed.push(dir);
                }
            }
        }
        Ok(())
    }

    /// Push every note file of a freshly adopted notebook.
    async fn push_local_notes(&mut self, name: &str, report: &mut ReconcileReport) {
        let Some(notebook) = self.state.notebook_by_name(name).cloned() else {
            return;
        };
        let files = match self.tree.note_files(name).await {
            Ok(files) => files,
            Err(e) => {
                error!("Failed to list files of '{}': {}", name, e);
                report.failed.push(name.to_string());
                return;
            }
        };
        for filename in files {
            let path = tree::note_path(name, &filename);
            match self.push_file(&notebook, &path, &filename).await {
                Ok(_) => report.pushed.push(path),
                Err(e) => {
                    error!("Failed to push note '{}': {}", path, e);
                    report.failed.push(path);
                }
            }
        }
    }

    /// Create a remote note from a local file and index it. Returns the
    /// stored title.
    async fn push_file(&mut self, notebook: &Notebook, path: &str, filename: &str) -> Result<String> {
        let text = self.tree.read_text(path).await?;
        let note = self
            .remote
            .create_note(
                &normalize_title(filename),
                &transcode::text_to_markup(&text),
                &notebook.id,
            )
            .await?;
        let title = note.title.clone();
        self.state.push_note(&notebook.name, note);
        Ok(title)
    }

    /// Create a remote notebook, index it, and lay out its directories.
    async fn create_notebook(&mut self, name: &str) -> Result<()> {
        let notebook = self.remote.create_notebook(name).await?;
        let name = notebook.name.clone();
        self.state.insert_notebook(notebook, Some(Vec::new()));
        self.tree.ensure_notebook(&name).await?;
        self.cache.ensure_notebook(&name).await?;
        Ok(())
    }
}
