//! Crash-safe JSON persistence for state files shared between processes.
//!
//! [`safe_json_read`] and [`safe_json_write`] never return errors: failures are
//! logged and turned into the default value or `false`, so contention or a
//! corrupt file cannot abort a caller mid-workflow. Use [`JsonStore`] directly
//! for typed documents, custom lock options, or the raising `try_*` variants.
//!
//! Concurrent read-modify-write cycles spanning two calls are last-writer-wins.

mod json_store;


pub use json_store::{DEFAULT_INDENT, DEFAULT_STORE_TIMEOUT, JsonStore};

use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;

/// Read the JSON document at `path`.
///
/// Returns `default` (an empty object when `None`) if the file does not exist,
/// cannot be parsed, or cannot be locked within ten seconds. A missing file is
/// not locked and nothing is created.
pub fn safe_json_read<P: AsRef<Path>>(path: P, default: Option<Value>) -> Value {
    let default = default.unwrap_or_else(|| Value::Object(Map::new()));
    JsonStore::default().read_or(path, default)
}

/// Atomically write `data` to `path` as JSON indented by `indent` spaces.
///
/// Returns `true` on success. On failure, returns `false`, the previous
/// content of `path` is left untouched, and the temporary file is removed.
pub fn safe_json_write<P, T>(path: P, data: &T, indent: usize) -> bool
where
    P: AsRef<Path>,
    T: Serialize + ?Sized,
{
    JsonStore::default().with_indent(indent).write(path, data)
}
