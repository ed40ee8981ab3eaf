//! Lock-protected JSON document store.

use crate::error::{Result, StoreError};
use crate::fs::{publish, write_temp_file};
use crate::lock::{FileLock, LockOptions};
use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Serializer;
use serde_json::ser::PrettyFormatter;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

/// Lock budget used by store reads and writes.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Indentation width of written documents.
pub const DEFAULT_INDENT: usize = 2;

/// Reads and writes JSON documents under a [`FileLock`].
///
/// Reads and writes take the same lock on the document path. Writes go
/// through a temporary file in the target's directory and are published by
/// atomic rename, so a reader never sees a partially written document.
///
/// With advisory locks the lock lives on the file that a rename replaces, so a
/// waiter that opens the path after a rename can proceed before the previous
/// writer has released. Every published document is still whole.
///
/// The `try_*` methods report failures. [`JsonStore::read_or`] and
/// [`JsonStore::write`] log them and degrade to the default value or `false`.
#[derive(Debug, Clone)]
pub struct JsonStore {
    lock: LockOptions,
    indent: usize,
}

impl Default for JsonStore {
    fn default() -> Self {
        Self {
            lock: LockOptions::new().with_timeout(DEFAULT_STORE_TIMEOUT),
            indent: DEFAULT_INDENT,
        }
    }
}

impl JsonStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lock_options(mut self, lock: LockOptions) -> Self {
        self.lock = lock;
        self
    }

    /// Indentation width; `0` writes compact single-line JSON.
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn lock_options(&self) -> &LockOptions {
        &self.lock
    }

    pub fn indent(&self) -> usize {
        self.indent
    }

    /// Read and parse the document at `path`.
    ///
    /// Returns `Ok(None)` without locking or creating anything if the file does
    /// not exist.
    pub fn try_read<T, P>(&self, path: P) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }

        let mut guard = FileLock::acquire(path, &self.lock)?;
        if guard.created_resource() {
            // Removed between the existence check and the lock.
            discard_placeholder(path);
            return Ok(None);
        }
        let file = guard.file_mut();
        let mut content = Vec::new();
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.read_to_end(&mut content))
            .map_err(|e| StoreError::io(format!("failed to read '{}'", path.display()), e))?;
        drop(guard);

        let value = serde_json::from_slice(&content).map_err(|e| {
            StoreError::Json(format!("failed to parse '{}': {}", path.display(), e))
        })?;
        Ok(Some(value))
    }

    /// Read the document at `path`, or return `default` on any failure.
    ///
    /// A missing file, malformed JSON, an I/O error, and a lock timeout all
    /// produce `default`; all but the first are logged as warnings.
    pub fn read_or<T, P>(&self, path: P, default: T) -> T
    where
        T: DeserializeOwned,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        match self.try_read(path) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                warn!("failed to read '{}', using default: {}", path.display(), e);
                default
            }
        }
    }

    /// Serialize `data` and atomically replace the document at `path`.
    ///
    /// The temporary file is written and synced before the lock is taken, so
    /// the lock is only held for the rename.
    pub fn try_write<T, P>(&self, path: P, data: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
        P: AsRef<Path>,
    {
        self.write_via(path.as_ref(), data, |temp, target| publish(temp, target))
    }

    /// Write `data` to `path`, returning `false` instead of an error.
    pub fn write<T, P>(&self, path: P, data: &T) -> bool
    where
        T: Serialize + ?Sized,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        match self.try_write(path, data) {
            Ok(()) => true,
            Err(e) => {
                warn!("failed to write '{}': {}", path.display(), e);
                false
            }
        }
    }

    pub(crate) fn write_via<T, F>(&self, path: &Path, data: &T, publish_with: F) -> Result<()>
    where
        T: Serialize + ?Sized,
        F: FnOnce(NamedTempFile, &Path) -> Result<()>,
    {
        let bytes = to_json_bytes(data, self.indent)?;
        // Dropping `temp` on any early return deletes it.
        let temp = write_temp_file(path, &bytes)?;
        debug!("staged '{}' as '{}'", path.display(), temp.path().display());

        let guard = FileLock::acquire(path, &self.lock)?;
        let published = publish_with(temp, path);
        if published.is_err() && guard.created_resource() {
            discard_placeholder(path);
        }
        drop(guard);
        published
    }
}

/// Remove the empty file the lock created for a document that was never written.
fn discard_placeholder(path: &Path) {
    let is_empty = std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() == 0)
        .unwrap_or(false);
    if is_empty && let Err(e) = std::fs::remove_file(path) {
        debug!("failed to remove placeholder '{}': {}", path.display(), e);
    }
}

/// Serialize with `indent` spaces per level. Non-ASCII text is written as-is.
pub(crate) fn to_json_bytes<T: Serialize + ?Sized>(data: &T, indent: usize) -> Result<Vec<u8>> {
    if indent == 0 {
        return Ok(serde_json::to_vec(data)?);
    }

    let indent = vec![b' '; indent];
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(&indent));
    data.serialize(&mut serializer)?;
    Ok(out)
}
