//! Error types for safejson.
//!
//! Uses thiserror for derive macros. The lock primitive and the raising store
//! operations return these errors; the `safe_json_*` helpers convert them into
//! default values and `false` returns instead.

use crate::exit_codes;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for safejson operations.
///
/// Each variant maps to a specific CLI exit code.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Invalid arguments or configuration.
    #[error("{0}")]
    UserError(String),

    /// The lock could not be acquired within its timeout budget.
    #[error(
        "timed out after {:.1}s waiting for lock on '{}'",
        .timeout.as_secs_f64(),
        .path.display()
    )]
    Timeout { path: PathBuf, timeout: Duration },

    /// A filesystem operation failed outside the retry loop.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// JSON could not be parsed or serialized.
    #[error("invalid JSON: {0}")]
    Json(String),
}

impl StoreError {
    /// Build an `Io` error with a human-readable context line.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        StoreError::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns true if this error is a lock timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, StoreError::Timeout { .. })
    }

    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            StoreError::UserError(_) => exit_codes::USER_ERROR,
            StoreError::Json(_) => exit_codes::DATA_FAILURE,
            StoreError::Io { .. } => exit_codes::IO_FAILURE,
            StoreError::Timeout { .. } => exit_codes::LOCK_FAILURE,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Json(err.to_string())
    }
}

/// Result type alias for safejson operations.
pub type Result<T> = std::result::Result<T, StoreError>;
