//! Filesystem utilities for safejson.
//!
//! This module provides the temp-file-then-rename primitive that keeps shared
//! state files from ever being observed half written.

pub mod atomic;

pub use atomic::{publish, write_temp_file};
