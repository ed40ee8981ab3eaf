//! Atomic publishing of file contents.
//!
//! Writes are split into two steps so a caller can take a lock in between:
//! 1. [`write_temp_file`] writes the content to a temporary file in the target's
//!    directory and syncs it to disk
//! 2. [`publish`] atomically renames the temporary file over the target
//!
//! Readers therefore see either the old content or the new content, never a
//! truncated file.
//!
//! # Cross-Platform Behavior
//!
//! - **POSIX (Linux, macOS)**: `rename()` replaces the destination atomically when
//!   source and destination are on the same filesystem. The parent directory is
//!   synced afterwards so the new entry survives a crash.
//! - **Windows**: `MoveFileExW` with `MOVEFILE_REPLACE_EXISTING`.
//!
//! # Important Notes
//!
//! - The temporary file is always created in the target's directory, so the
//!   rename never crosses a volume boundary
//! - Temporary files are named `.tmp_XXXXXX.json`
//! - A temporary file that is not published is deleted when it is dropped

use crate::error::{Result, StoreError};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::{Builder, NamedTempFile};

/// Prefix of temporary files created next to their target.
pub const TEMP_PREFIX: &str = ".tmp_";

/// Suffix of temporary files created next to their target.
pub const TEMP_SUFFIX: &str = ".json";

/// Write `content` to a new temporary file beside `target` and sync it.
///
/// The parent directory of `target` is created if it does not exist. The
/// returned handle deletes the file on drop unless it is passed to [`publish`].
///
/// # Returns
///
/// * `Ok(NamedTempFile)` - Fully written and synced temporary file
/// * `Err(StoreError::Io)` - Directory creation, write, or sync failure
pub fn write_temp_file<P: AsRef<Path>>(target: P, content: &[u8]) -> Result<NamedTempFile> {
    let target = target.as_ref();
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| {
            StoreError::io(
                format!("failed to create parent directory '{}'", dir.display()),
                e,
            )
        })?;
    }

    let mut temp = Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| {
            StoreError::io(
                format!("failed to create temporary file in '{}'", dir.display()),
                e,
            )
        })?;

    temp.write_all(content)
        .and_then(|()| temp.flush())
        .map_err(|e| StoreError::io("failed to write temporary file", e))?;

    temp.as_file()
        .sync_all()
        .map_err(|e| StoreError::io("failed to sync temporary file to disk", e))?;

    Ok(temp)
}

/// Atomically replace `target` with `temp`.
///
/// On failure the temporary file is deleted; a failure to delete it is ignored.
pub fn publish<P: AsRef<Path>>(temp: NamedTempFile, target: P) -> Result<()> {
    let target = target.as_ref();

    // PersistError hands the NamedTempFile back; dropping it removes the file.
    temp.persist(target).map_err(|e| {
        StoreError::io(
            format!("failed to atomically replace '{}'", target.display()),
            e.error,
        )
    })?;

    sync_parent_dir(target);
    Ok(())
}

/// Persist the directory entry after a rename. Best effort.
#[cfg(unix)]
fn sync_parent_dir(target: &Path) {
    if let Some(parent) = target.parent() {
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_target: &Path) {}
