//! Utility functions and helpers
//!
//! This module contains durable file helpers used by the file store.

pub mod atomic;

pub use atomic::{
    append_line_synced, atomic_write_with, cleanup_temp_file, AtomicError, AtomicResult,
};
