//! Exit code constants for the safejson CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config)
//! - 2: Data failure (malformed JSON input)
//! - 3: Filesystem failure
//! - 4: Lock acquisition timed out

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or invalid configuration.
pub const USER_ERROR: i32 = 1;

/// Data failure: input could not be parsed or serialized as JSON.
pub const DATA_FAILURE: i32 = 2;

/// Filesystem failure: a read, write, or rename did not complete.
pub const IO_FAILURE: i32 = 3;

/// Lock acquisition failure: the lock was not obtained before the timeout.
pub const LOCK_FAILURE: i32 = 4;
