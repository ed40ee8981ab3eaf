//! Lock acquisition, probing, and marker recovery operations.

use super::guard::FileLock;
use super::metadata::MarkerMetadata;
use super::types::{LockOptions, LockStrategy, MarkerInfo};
use crate::error::{Result, StoreError};
use fs2::FileExt;
use log::{debug, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// Outcome of a single acquisition attempt.
enum Attempt {
    Acquired {
        file: File,
        marker: Option<PathBuf>,
        created: bool,
    },
    /// Another holder owns the resource.
    Contended,
    /// A stale marker was removed; try again without sleeping.
    BrokeStale,
    /// Retry-eligible I/O failure.
    Failed(io::Error),
}

impl FileLock {
    /// Acquire exclusive ownership of `path`, retrying until `options.timeout`.
    ///
    /// Contention and I/O errors inside the retry loop are both folded into the
    /// timeout budget. A timeout too large to represent as a deadline waits
    /// indefinitely. Parent directory creation happens first and fails
    /// immediately with `StoreError::Io`.
    ///
    /// # Returns
    ///
    /// * `Ok(FileLock)` - Guard holding the lock and an open read-write handle
    /// * `Err(StoreError::Timeout)` - The lock was not obtained in time
    /// * `Err(StoreError::Io)` - The parent directory could not be created
    pub fn acquire<P: AsRef<Path>>(path: P, options: &LockOptions) -> Result<FileLock> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;

        let deadline = Instant::now().checked_add(options.timeout);
        loop {
            match attempt(path, options) {
                Attempt::Acquired {
                    file,
                    marker,
                    created,
                } => {
                    return Ok(FileLock::new(
                        file,
                        path.to_path_buf(),
                        marker,
                        options.strategy,
                        created,
                    ));
                }
                Attempt::BrokeStale if deadline.is_none_or(|d| Instant::now() < d) => continue,
                Attempt::BrokeStale | Attempt::Contended => {}
                Attempt::Failed(e) => {
                    debug!("lock attempt on '{}' failed, retrying: {}", path.display(), e);
                }
            }

            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(StoreError::Timeout {
                            path: path.to_path_buf(),
                            timeout: options.timeout,
                        });
                    }
                    options.retry_interval.min(deadline - now)
                }
                None => options.retry_interval,
            };
            thread::sleep(pause);
        }
    }

    /// Make a single, non-blocking acquisition attempt.
    ///
    /// Returns `Ok(None)` if another holder owns the resource.
    pub fn try_acquire<P: AsRef<Path>>(path: P, options: &LockOptions) -> Result<Option<FileLock>> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;

        let mut outcome = attempt(path, options);
        if let Attempt::BrokeStale = outcome {
            outcome = attempt(path, options);
        }

        match outcome {
            Attempt::Acquired {
                file,
                marker,
                created,
            } => Ok(Some(FileLock::new(
                file,
                path.to_path_buf(),
                marker,
                options.strategy,
                created,
            ))),
            Attempt::Contended | Attempt::BrokeStale => Ok(None),
            Attempt::Failed(e) => Err(StoreError::io(
                format!("failed to lock '{}'", path.display()),
                e,
            )),
        }
    }
}

/// Path of the marker file guarding `path`: the full file name plus `.lock`.
pub fn marker_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let mut name = path.as_ref().as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Check whether `path` is currently held under the given strategy.
///
/// Never creates the resource. For the advisory strategy this briefly takes
/// and drops the lock when it is free.
pub fn is_locked<P: AsRef<Path>>(path: P, strategy: LockStrategy) -> Result<bool> {
    let path = path.as_ref();
    match strategy {
        LockStrategy::Marker => Ok(marker_path(path).exists()),
        LockStrategy::Advisory => {
            let file = match File::open(path) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
                Err(e) => {
                    return Err(StoreError::io(
                        format!("failed to open '{}'", path.display()),
                        e,
                    ));
                }
            };
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => {
                    let _ = FileExt::unlock(&file);
                    Ok(false)
                }
                Err(e) if is_contended(&e) => Ok(true),
                Err(e) => Err(StoreError::io(
                    format!("failed to probe lock on '{}'", path.display()),
                    e,
                )),
            }
        }
    }
}

/// Describe the marker guarding `path`, if one exists.
pub fn inspect_marker<P: AsRef<Path>>(path: P) -> Result<Option<MarkerInfo>> {
    let marker = marker_path(path);
    match marker_age(&marker) {
        Ok(age) => Ok(Some(MarkerInfo {
            metadata: MarkerMetadata::from_file(&marker).ok(),
            path: marker,
            age,
        })),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(
            format!("failed to inspect marker '{}'", marker.display()),
            e,
        )),
    }
}

/// Remove the marker guarding `path`.
///
/// The caller is responsible for deciding that removal is appropriate; a live
/// holder loses its exclusivity when its marker is cleared.
///
/// # Returns
///
/// * `Ok(MarkerInfo)` - Information about the removed marker
/// * `Err(StoreError::UserError)` - No marker exists
pub fn clear_marker<P: AsRef<Path>>(path: P) -> Result<MarkerInfo> {
    let path = path.as_ref();
    let info = inspect_marker(path)?.ok_or_else(|| {
        StoreError::UserError(format!(
            "no marker exists for '{}' (expected {})",
            path.display(),
            marker_path(path).display()
        ))
    })?;

    fs::remove_file(&info.path).map_err(|e| {
        StoreError::io(
            format!("failed to clear marker '{}'", info.path.display()),
            e,
        )
    })?;

    Ok(info)
}

fn attempt(path: &Path, options: &LockOptions) -> Attempt {
    match options.strategy {
        LockStrategy::Advisory => attempt_advisory(path),
        LockStrategy::Marker => attempt_marker(path, options.stale_after),
    }
}

fn attempt_advisory(path: &Path) -> Attempt {
    let (file, created) = match open_resource(path) {
        Ok(opened) => opened,
        Err(e) => return Attempt::Failed(e),
    };

    // On failure the descriptor is dropped here; nothing stays open between retries.
    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => Attempt::Acquired {
            file,
            marker: None,
            created,
        },
        Err(e) if is_contended(&e) => Attempt::Contended,
        Err(e) => Attempt::Failed(e),
    }
}

fn attempt_marker(path: &Path, stale_after: Option<Duration>) -> Attempt {
    let marker = marker_path(path);

    let mut handle = match OpenOptions::new().write(true).create_new(true).open(&marker) {
        Ok(handle) => handle,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return match stale_after {
                Some(limit) if break_if_stale(&marker, limit) => Attempt::BrokeStale,
                _ => Attempt::Contended,
            };
        }
        Err(e) => return Attempt::Failed(e),
    };

    let written = MarkerMetadata::new()
        .to_json()
        .map_err(|e| io::Error::other(e.to_string()))
        .and_then(|json| handle.write_all(json.as_bytes()));
    drop(handle);
    if let Err(e) = written {
        let _ = fs::remove_file(&marker);
        return Attempt::Failed(e);
    }

    match open_resource(path) {
        Ok((file, created)) => Attempt::Acquired {
            file,
            marker: Some(marker),
            created,
        },
        Err(e) => {
            let _ = fs::remove_file(&marker);
            Attempt::Failed(e)
        }
    }
}

/// Remove `marker` if it is older than `limit`. Returns true if the caller
/// should retry immediately.
///
/// Breakers serialize on a `<marker>.break` file and re-judge the marker while
/// holding it, so a marker that another waiter already replaced is never
/// removed on the strength of an earlier reading.
fn break_if_stale(marker: &Path, limit: Duration) -> bool {
    match staleness(marker, limit) {
        Staleness::Stale(_) => {}
        Staleness::Fresh => return false,
        // Vanished between the create attempt and now: just retry.
        Staleness::Missing => return true,
    }

    let Some(_breaker) = BreakClaim::take(marker, limit) else {
        return false;
    };

    let age = match staleness(marker, limit) {
        Staleness::Stale(age) => age,
        Staleness::Fresh => return false,
        Staleness::Missing => return true,
    };

    match fs::remove_file(marker) {
        Ok(()) => {
            warn!(
                "removed stale marker '{}' (age {}s exceeds {}s)",
                marker.display(),
                age.as_secs(),
                limit.as_secs()
            );
            true
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
            debug!("failed to remove stale marker '{}': {}", marker.display(), e);
            false
        }
    }
}

enum Staleness {
    Missing,
    Fresh,
    Stale(Duration),
}

/// Judge `marker` against `limit`. A marker whose age cannot be read counts as fresh.
fn staleness(marker: &Path, limit: Duration) -> Staleness {
    match marker_age(marker) {
        Ok(age) if age > limit => Staleness::Stale(age),
        Ok(_) => Staleness::Fresh,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Staleness::Missing,
        Err(_) => Staleness::Fresh,
    }
}

/// Exclusive right to break the marker it was taken for. Released on drop.
struct BreakClaim {
    path: PathBuf,
}

impl BreakClaim {
    fn take(marker: &Path, limit: Duration) -> Option<BreakClaim> {
        let mut name = marker.as_os_str().to_owned();
        name.push(".break");
        let path = PathBuf::from(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Some(BreakClaim { path }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                // A breaker that died mid-break leaves its claim behind.
                let abandoned = fs::metadata(&path)
                    .and_then(|meta| meta.modified())
                    .ok()
                    .and_then(|mtime| mtime.elapsed().ok())
                    .is_some_and(|age| age > limit);
                if abandoned && fs::remove_file(&path).is_ok() {
                    warn!("removed abandoned break claim '{}'", path.display());
                }
                None
            }
            Err(e) => {
                debug!("failed to claim '{}': {}", path.display(), e);
                None
            }
        }
    }
}

impl Drop for BreakClaim {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("failed to remove break claim '{}': {}", self.path.display(), e);
        }
    }
}

/// Age of a marker from its metadata timestamp, falling back to its mtime.
fn marker_age(marker: &Path) -> io::Result<Duration> {
    let stat = fs::metadata(marker)?;
    if let Ok(meta) = MarkerMetadata::from_file(marker) {
        return Ok(meta.age().to_std().unwrap_or_default());
    }
    Ok(stat.modified()?.elapsed().unwrap_or_default())
}

/// Open the resource read-write, creating it empty if it does not exist.
/// The flag reports whether this call created it.
fn open_resource(path: &Path) -> io::Result<(File, bool)> {
    let mut options = OpenOptions::new();
    options.read(true).write(true);
    match options.clone().create_new(true).open(path) {
        Ok(file) => Ok((file, true)),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok((options.open(path)?, false)),
        Err(e) => Err(e),
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            StoreError::io(
                format!("failed to create directory '{}'", parent.display()),
                e,
            )
        })?;
    }
    Ok(())
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
