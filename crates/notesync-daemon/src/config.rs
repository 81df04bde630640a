//! Command-line arguments and the resolved daemon configuration.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

/// Default sync root under the user's home directory.
const DEFAULT_ROOT_DIR: &str = "evernote";
/// Remote snapshot file, relative to the sync root.
const DEFAULT_STORE_FILE: &str = ".config/remote.json";
/// Log file, relative to the sync root.
const DEFAULT_LOG_FILE: &str = ".config/notesync.log";

#[derive(Parser, Debug)]
#[command(name = "notesync-daemon")]
#[command(about = "Keep a directory of plain-text files in sync with remote notebooks")]
pub struct Args {
    /// Sync root directory (default: $HOME/evernote)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Remote store snapshot file (default: <root>/.config/remote.json)
    #[arg(short, long)]
    pub store: Option<PathBuf>,

    /// Log file (default: <root>/.config/notesync.log)
    #[arg(long, conflicts_with = "no_log_file")]
    pub log_file: Option<PathBuf>,

    /// Log to stderr only
    #[arg(long)]
    pub no_log_file: bool,

    /// Disable desktop notifications
    #[arg(long)]
    pub no_notify: bool,

    /// Enable verbose logging
    #[arg(long)]
    pub verbose: bool,
}

/// Daemon configuration with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub root: PathBuf,
    pub store_path: PathBuf,
    pub log_file: Option<PathBuf>,
    pub notify: bool,
    pub verbose: bool,
}

impl Config {
    /// Resolve arguments using `$HOME` for the default root.
    pub fn from_args(args: Args) -> Result<Self> {
        let home = std::env::var_os("HOME").map(PathBuf::from);
        Self::resolve(args, home)
    }

    /// Resolve arguments against an explicit home directory.
    pub fn resolve(args: Args, home: Option<PathBuf>) -> Result<Self> {
        let root = match args.root {
            Some(root) => root,
            None => home
                .context("HOME is not set; pass --root")?
                .join(DEFAULT_ROOT_DIR),
        };

        let store_path = args.store.unwrap_or_else(|| root.join(DEFAULT_STORE_FILE));
        let log_file = if args.no_log_file {
            None
        } else {
            Some(args.log_file.unwrap_or_else(|| root.join(DEFAULT_LOG_FILE)))
        };

        Ok(Self {
            root,
            store_path,
            log_file,
            notify: !args.no_notify,
            verbose: args.verbose,
        })
    }
}
