//! Command implementations for safejson.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Output goes to the supplied writer so commands can be
//! exercised in tests without capturing stdout.

mod document;
mod lock;


use crate::cli::{Cli, Command, LockAction};
use safejson::config::Config;
use safejson::error::Result;
use std::io::Write;

/// Dispatch a command to its implementation.
///
/// Loads the configuration first, so a broken config file fails every command.
pub fn dispatch(cli: Cli, out: &mut dyn Write) -> Result<()> {
    let config = Config::discover(cli.config.as_deref())?;

    match cli.command {
        Command::Read(args) => document::cmd_read(&config, args, out),
        Command::Write(args) => document::cmd_write(&config, args, out),
        Command::Lock(lock_cmd) => match lock_cmd.action {
            LockAction::Hold(args) => lock::cmd_lock_hold(&config, args, out),
            LockAction::Status(args) => lock::cmd_lock_status(&config, args, out),
            LockAction::Clear(args) => lock::cmd_lock_clear(args, out),
        },
    }
}

/// Map a failed write to stdout into an error.
fn output_error(e: std::io::Error) -> safejson::error::StoreError {
    safejson::error::StoreError::io("failed to write output", e)
}
