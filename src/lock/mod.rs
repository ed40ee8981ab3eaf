//! Scoped, timeout-bounded exclusive locks on resource files.
//!
//! A [`FileLock`] grants one holder at a time exclusive ownership of a path.
//! Ownership is represented in one of two ways:
//!
//! - **Advisory** (POSIX default): a non-blocking `flock` taken on a descriptor
//!   for the resource file itself. The resource is created empty if absent.
//!   No file artifact exists; the kernel drops the lock if the holder dies.
//! - **Marker** (Windows default): a sibling `<resource>.lock` file created with
//!   **create_new** semantics. The marker holds JSON metadata (owner, pid,
//!   created_at) and is deleted on release.
//!
//! # Acquisition
//!
//! Acquisition polls at `retry_interval` until `timeout` elapses, then fails with
//! `StoreError::Timeout`. No fairness is provided among waiters.
//!
//! # RAII Guards
//!
//! The guard releases on drop. If deletion of a marker fails during drop, a
//! warning is logged and the program continues.

mod guard;
mod metadata;
mod operations;
mod types;

#[cfg(test)]
mod tests;

// Re-export public API
pub use guard::FileLock;
pub use metadata::MarkerMetadata;
pub use operations::{clear_marker, inspect_marker, is_locked, marker_path};
pub use types::{DEFAULT_RETRY_INTERVAL, DEFAULT_TIMEOUT, LockOptions, LockStrategy, MarkerInfo};
