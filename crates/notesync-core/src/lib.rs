//! notesync-core: keeps a directory of plain-text files in lockstep with a
//! remote notebook service.
//!
//! This crate provides:
//! - Transcoding between remote note markup and plain text
//! - The local tree layout and the last-sync cache
//! - The sync engine: startup reconciliation and local change handling
//! - FileSystem, RemoteStore and Notifier trait abstractions

pub mod cache;
pub mod engine;
pub mod events;
pub mod filter;
pub mod fs;
pub mod model;
pub mod notifier;
pub mod remote;
pub mod state;
pub mod transcode;
pub mod tree;

pub use cache::SyncCache;
pub use engine::{Applied, ReconcileReport, SyncEngine, SyncError};
pub use events::{FileEvent, FileEventKind};
pub use fs::{FileEntry, FileSystem, FsError, InMemoryFs};
pub use model::{normalize_title, Note, Notebook, MAX_TITLE_CHARS};
pub use notifier::{NoopNotifier, Notifier};
pub use remote::{MemoryStore, Operation, RemoteError, RemoteStore, StoreSnapshot};
pub use state::SyncState;
pub use tree::LocalTree;
