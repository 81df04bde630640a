//! notesync-daemon library: exposes the daemon components for testing.
//!
//! The binary wires these together; integration tests drive them directly.

pub mod config;
pub mod desktop;
pub mod native_fs;
pub mod snapshot;
pub mod watcher;

pub use config::{Args, Config};
pub use desktop::DesktopNotifier;
pub use native_fs::NativeFs;
pub use snapshot::SnapshotStore;
pub use watcher::ChangeWatcher;
