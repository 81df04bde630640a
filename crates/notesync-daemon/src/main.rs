//! notesync-daemon: keeps a directory of plain-text files in sync with
//! remote notebooks.
//!
//! Reconciles the local tree against the remote once at startup, then
//! pushes local changes as they happen.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use notesync_core::{NoopNotifier, Notifier, SyncEngine};
use notesync_daemon::{Args, ChangeWatcher, Config, DesktopNotifier, NativeFs, SnapshotStore};

/// Set up logging to stderr, mirrored to `log_file` when given.
///
/// Respects RUST_LOG, defaults to info (or debug with --verbose).
fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default_filter = if verbose {
        "debug,notesync_core=debug,notesync_daemon=debug"
    } else {
        "info,notesync_core=info,notesync_daemon=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_args(Args::parse())?;

    // The log file lives under the sync root, so the layout comes first
    fs::create_dir_all(config.root.join(".config"))
        .with_context(|| format!("creating {}", config.root.display()))?;
    init_logging(config.verbose, config.log_file.as_deref())?;

    info!("Starting notesync-daemon");
    info!("Sync root: {:?}", config.root);
    info!("Remote store: {:?}", config.store_path);

    let remote = SnapshotStore::open(config.store_path.clone())?;
    let fs = NativeFs::new(config.root.clone());
    let notifier: Arc<dyn Notifier> = if config.notify {
        Arc::new(DesktopNotifier::new())
    } else {
        Arc::new(NoopNotifier)
    };

    let mut engine = SyncEngine::new(remote, fs).with_notifier(notifier);

    engine
        .check_remote_version()
        .await
        .context("remote protocol version check failed")?;

    let report = engine
        .reconcile_all()
        .await
        .context("startup reconciliation failed")?;
    if !report.failed.is_empty() {
        warn!(
            "{} notebook(s) could not be synced: {}",
            report.failed.len(),
            report.failed.join(", ")
        );
    }

    // Armed only now so reconciliation writes are not echoed back
    let mut watcher = ChangeWatcher::new(config.root.clone())?;
    info!("File watcher started on {:?}", watcher.root());

    info!("Daemon running. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            event = watcher.recv() => {
                match event {
                    Some(event) => {
                        engine.handle_event(&event).await;
                    }
                    None => {
                        warn!("File watcher stopped");
                        break;
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("Shutting down");
    Ok(())
}
