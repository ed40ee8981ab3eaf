//! CLI argument parsing for safejson.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// safejson: lock-protected, crash-safe JSON state files.
///
/// Documents are written through a temporary file and an atomic rename while
/// holding an exclusive lock on the target, so concurrent processes never see
/// a partial write.
#[derive(Parser, Debug)]
#[command(name = "safejson")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (default: ./safejson.yaml when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for safejson.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a JSON document.
    ///
    /// Falls back to the default document if the file is missing, corrupt,
    /// or stays locked past the store timeout.
    Read(ReadArgs),

    /// Atomically replace a JSON document.
    ///
    /// The new document is taken from the argument, or from stdin when omitted.
    Write(WriteArgs),

    /// Lock management commands.
    ///
    /// Hold, inspect, or clear the lock on a resource.
    Lock(LockCommand),
}

/// Arguments for the `read` command.
#[derive(Parser, Debug)]
pub struct ReadArgs {
    /// Document path.
    pub path: PathBuf,

    /// Document to print when the file cannot be read (default: {}).
    #[arg(long)]
    pub default: Option<String>,
}

/// Arguments for the `write` command.
#[derive(Parser, Debug)]
pub struct WriteArgs {
    /// Document path.
    pub path: PathBuf,

    /// JSON document to write. Read from stdin when omitted.
    pub json: Option<String>,

    /// Indentation width (overrides the config file).
    #[arg(long)]
    pub indent: Option<usize>,
}

/// Lock subcommand wrapper.
#[derive(Parser, Debug)]
pub struct LockCommand {
    #[command(subcommand)]
    pub action: LockAction,
}

/// Available lock actions.
#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// Acquire the lock and hold it for a while.
    ///
    /// Prints `acquired <path>` once the lock is held.
    Hold(LockHoldArgs),

    /// Report whether a resource is locked.
    Status(LockPathArgs),

    /// Remove an abandoned marker file.
    ///
    /// Requires --force flag to prevent accidental clearing.
    Clear(LockClearArgs),
}

/// Arguments for the `lock hold` command.
#[derive(Parser, Debug)]
pub struct LockHoldArgs {
    /// Resource path.
    pub path: PathBuf,

    /// Seconds to hold the lock before releasing.
    #[arg(long, default_value_t = 0.0)]
    pub seconds: f64,

    /// Seconds to wait for the lock (overrides the config file).
    #[arg(long)]
    pub timeout: Option<f64>,
}

/// Arguments naming a single resource.
#[derive(Parser, Debug)]
pub struct LockPathArgs {
    /// Resource path.
    pub path: PathBuf,
}

/// Arguments for the `lock clear` command.
#[derive(Parser, Debug)]
pub struct LockClearArgs {
    /// Resource path whose marker should be cleared.
    pub path: PathBuf,

    /// Force clearing the marker (required for safety).
    #[arg(long)]
    pub force: bool,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
