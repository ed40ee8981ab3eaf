//! `lock hold`, `lock status`, and `lock clear` commands.

use super::output_error;
use crate::cli::{LockClearArgs, LockHoldArgs, LockPathArgs};
use safejson::config::Config;
use safejson::error::{Result, StoreError};
use safejson::lock::{self, FileLock};
use std::io::Write;
use std::time::Duration;

pub(super) fn cmd_lock_hold(config: &Config, args: LockHoldArgs, out: &mut dyn Write) -> Result<()> {
    let mut options = config.lock_options();
    if let Some(timeout) = args.timeout {
        options = options.with_timeout(seconds("--timeout", timeout)?);
    }
    let hold = if args.seconds == 0.0 {
        Duration::ZERO
    } else {
        seconds("--seconds", args.seconds)?
    };

    let guard = FileLock::acquire(&args.path, &options)?;
    writeln!(out, "acquired {}", args.path.display()).map_err(output_error)?;
    out.flush().map_err(output_error)?;

    std::thread::sleep(hold);
    guard.release()?;

    writeln!(out, "released {}", args.path.display()).map_err(output_error)
}

pub(super) fn cmd_lock_status(config: &Config, args: LockPathArgs, out: &mut dyn Write) -> Result<()> {
    let strategy = config.strategy.resolve();
    let locked = lock::is_locked(&args.path, strategy)?;

    writeln!(
        out,
        "{}: {} ({} lock)",
        args.path.display(),
        if locked { "locked" } else { "free" },
        strategy
    )
    .map_err(output_error)?;

    if let Some(info) = lock::inspect_marker(&args.path)? {
        writeln!(out, "  Marker:     {}", info.path.display()).map_err(output_error)?;
        match &info.metadata {
            Some(meta) => {
                writeln!(out, "  Owner:      {}", meta.owner).map_err(output_error)?;
                if let Some(pid) = meta.pid {
                    writeln!(out, "  PID:        {}", pid).map_err(output_error)?;
                }
                writeln!(
                    out,
                    "  Created:    {}",
                    meta.created_at.format("%Y-%m-%d %H:%M:%S UTC")
                )
                .map_err(output_error)?;
                writeln!(out, "  Age:        {}", meta.age_string()).map_err(output_error)?;
            }
            None => {
                writeln!(out, "  Metadata:   unreadable").map_err(output_error)?;
                writeln!(out, "  Age:        {}s", info.age.as_secs()).map_err(output_error)?;
            }
        }
        if let Some(limit) = config.stale_marker_secs
            && info.age.as_secs_f64() > limit
        {
            writeln!(out, "  Status:     STALE (exceeds {}s threshold)", limit)
                .map_err(output_error)?;
        }
    }

    Ok(())
}

pub(super) fn cmd_lock_clear(args: LockClearArgs, out: &mut dyn Write) -> Result<()> {
    if !args.force {
        return Err(StoreError::UserError(format!(
            "refusing to clear marker without --force flag.\n\n\
             Clearing a marker breaks exclusivity if its holder is still active.\n\
             Only clear markers if you are certain the holder has crashed.\n\n\
             To clear the marker, run:\n  safejson lock clear {} --force",
            args.path.display()
        )));
    }

    let cleared = lock::clear_marker(&args.path)?;
    writeln!(out, "Cleared marker: {}", cleared).map_err(output_error)
}

fn seconds(flag: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .ok()
        .filter(|d| !d.is_zero())
        .ok_or_else(|| {
            StoreError::UserError(format!(
                "{} must be a positive number of seconds (found {})",
                flag, value
            ))
        })
}
