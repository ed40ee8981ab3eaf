//! RAII guard for a held resource lock.

use super::types::LockStrategy;
use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use log::{debug, warn};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Exclusive ownership of a resource file for the lifetime of the guard.
///
/// The guard owns a read-write handle to the resource. When dropped, the
/// advisory lock is released and the handle closed, and only then is a marker
/// file created by this guard deleted. Release failures during drop are logged,
/// never raised.
#[derive(Debug)]
pub struct FileLock {
    // Field order is drop order: the handle closes before the marker goes.
    handle: Handle,
    marker: Option<Marker>,
    path: PathBuf,
    strategy: LockStrategy,
    acquired_at: DateTime<Utc>,
    created: bool,
}

/// The open resource handle. Unlocks before it closes.
#[derive(Debug)]
struct Handle {
    file: File,
    advisory: bool,
}

impl Handle {
    fn unlock(&self) -> io::Result<()> {
        if self.advisory {
            FileExt::unlock(&self.file)
        } else {
            Ok(())
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Err(e) = self.unlock() {
            debug!("failed to unlock resource handle: {}", e);
        }
    }
}

/// A marker file owned by the guard, deleted when dropped.
#[derive(Debug)]
struct Marker {
    path: PathBuf,
    removed: bool,
}

impl Marker {
    fn remove(mut self) -> io::Result<()> {
        self.removed = true;
        fs::remove_file(&self.path)
    }
}

impl Drop for Marker {
    fn drop(&mut self) {
        if !self.removed
            && let Err(e) = fs::remove_file(&self.path)
        {
            warn!("failed to remove marker '{}': {}", self.path.display(), e);
        }
    }
}

impl FileLock {
    pub(super) fn new(
        file: File,
        path: PathBuf,
        marker: Option<PathBuf>,
        strategy: LockStrategy,
        created: bool,
    ) -> Self {
        debug!("acquired {} lock on '{}'", strategy, path.display());
        Self {
            handle: Handle {
                file,
                advisory: strategy == LockStrategy::Advisory,
            },
            marker: marker.map(|path| Marker {
                path,
                removed: false,
            }),
            path,
            strategy,
            acquired_at: Utc::now(),
            created,
        }
    }

    /// The protected resource path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The marker file this guard created, if the marker strategy was used.
    pub fn marker_path(&self) -> Option<&Path> {
        self.marker.as_ref().map(|marker| marker.path.as_path())
    }

    pub fn strategy(&self) -> LockStrategy {
        self.strategy
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    /// Whether acquiring this lock created the (empty) resource file.
    pub fn created_resource(&self) -> bool {
        self.created
    }

    /// The open resource handle.
    pub fn file(&self) -> &File {
        &self.handle.file
    }

    /// The open resource handle, for reading and writing under the lock.
    pub fn file_mut(&mut self) -> &mut File {
        &mut self.handle.file
    }

    /// Release the lock now and report any failure.
    pub fn release(self) -> Result<()> {
        let FileLock {
            handle,
            marker,
            path,
            ..
        } = self;

        let unlocked = handle.unlock();
        drop(handle);
        unlocked.map_err(|e| {
            StoreError::io(format!("failed to unlock '{}'", path.display()), e)
        })?;

        if let Some(marker) = marker {
            let marker_path = marker.path.clone();
            marker.remove().map_err(|e| {
                StoreError::io(
                    format!("failed to remove marker '{}'", marker_path.display()),
                    e,
                )
            })?;
        }

        debug!("released lock on '{}'", path.display());
        Ok(())
    }
}
