//! Cross-platform file locking and crash-safe JSON persistence.
//!
//! - [`lock::FileLock`] gives one holder at a time exclusive, timeout-bounded
//!   ownership of a resource file and releases it on drop.
//! - [`store::safe_json_read`] and [`store::safe_json_write`] read and atomically
//!   replace JSON documents under that lock, degrading to defaults instead of
//!   failing.
//!
//! ```no_run
//! use safejson::store::{safe_json_read, safe_json_write};
//! use serde_json::json;
//!
//! assert!(safe_json_write("users/index.json", &json!({"a": 1}), 2));
//! let index = safe_json_read("users/index.json", None);
//! assert_eq!(index, json!({"a": 1}));
//! ```

pub mod config;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod lock;
pub mod store;

#[cfg(test)]
mod test_support;

pub use error::{Result, StoreError};
pub use lock::{FileLock, LockOptions, LockStrategy};
pub use store::{JsonStore, safe_json_read, safe_json_write};
