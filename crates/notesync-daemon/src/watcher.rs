//! ChangeWatcher: recursive file watcher for the sync root.
//!
//! Uses notify's recommended watcher. Create, remove and content-modify
//! events are mapped to `FileEvent`s and delivered in arrival order over a
//! single channel; everything else (renames, metadata, access) is dropped,
//! as is anything matching the exclusion filter.

use anyhow::Result;
use notesync_core::filter;
use notesync_core::{FileEvent, FileEventKind};
use notify::event::{EventKind, ModifyKind};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Track last seen mtime to drop repeated modify events for an unchanged file
type MtimeCache = Arc<Mutex<HashMap<PathBuf, SystemTime>>>;

/// File watcher that monitors the sync root.
pub struct ChangeWatcher {
    /// Sync root
    root: PathBuf,
    /// Watcher handle (must keep alive)
    _watcher: RecommendedWatcher,
    /// Receiver for file events
    event_rx: mpsc::UnboundedReceiver<FileEvent>,
}

impl ChangeWatcher {
    /// Start watching `root` recursively.
    pub fn new(root: PathBuf) -> Result<Self> {
        // Canonicalize the path to resolve symlinks. On macOS, /var/folders/...
        // is actually /private/var/folders/..., and FSEvents needs the real path.
        let root = root.canonicalize().unwrap_or(root);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let root_clone = root.clone();
        let mtime_cache: MtimeCache = Arc::new(Mutex::new(HashMap::new()));

        let mut watcher =
            notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
                match result {
                    Ok(event) => {
                        for file_event in Self::process_event(&event, &root_clone, &mtime_cache) {
                            if event_tx.send(file_event).is_err() {
                                // Receiver dropped
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        error!("File watcher error: {}", e);
                    }
                }
            })?;

        watcher.watch(&root, RecursiveMode::Recursive)?;

        Ok(Self {
            root,
            _watcher: watcher,
            event_rx,
        })
    }

    /// Map a raw notify event to zero or more sync-relevant events.
    pub fn process_event(
        event: &notify::Event,
        root: &Path,
        mtime_cache: &MtimeCache,
    ) -> Vec<FileEvent> {
        let Some(kind) = classify(&event.kind) else {
            return Vec::new();
        };

        event
            .paths
            .iter()
            .filter_map(|path| {
                let relative = relative_path(path, root)?;
                if filter::is_excluded(&relative) {
                    return None;
                }
                if is_repeat(kind, path, mtime_cache) {
                    return None;
                }
                debug!("File event: {} - {}", kind, relative);
                Some(FileEvent::new(kind, relative))
            })
            .collect()
    }

    /// Wait for the next event. `None` once the watcher has stopped.
    pub async fn recv(&mut self) -> Option<FileEvent> {
        self.event_rx.recv().await
    }

    /// Get the receiver for file events.
    pub fn event_rx(&mut self) -> &mut mpsc::UnboundedReceiver<FileEvent> {
        &mut self.event_rx
    }

    /// Get the watched root.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn classify(kind: &EventKind) -> Option<FileEventKind> {
    match kind {
        EventKind::Create(_) => Some(FileEventKind::Created),
        EventKind::Remove(_) => Some(FileEventKind::Deleted),
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => Some(FileEventKind::Modified),
        _ => None,
    }
}

/// `/`-separated path relative to the root, or `None` for the root itself
/// and for paths outside it.
fn relative_path(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Whether a modify event repeats one already seen for the same mtime.
/// Keyed by absolute path; deletions drop the entry.
fn is_repeat(kind: FileEventKind, path: &Path, mtime_cache: &MtimeCache) -> bool {
    match kind {
        FileEventKind::Modified => {
            let Ok(mtime) = std::fs::metadata(path).and_then(|m| m.modified()) else {
                return false;
            };
            let mut cache = mtime_cache.lock().expect("mtime cache mutex poisoned");
            if cache.get(path) == Some(&mtime) {
                return true;
            }
            cache.insert(path.to_path_buf(), mtime);
            false
        }
        FileEventKind::Deleted => {
            let mut cache = mtime_cache.lock().expect("mtime cache mutex poisoned");
            cache.remove(path);
            false
        }
        FileEventKind::Created => false,
    }
}
