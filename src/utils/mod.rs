//! Shared helpers for file output and retrying fallible operations.
//!
//! # Modules
//!
//! - [`fs`] - atomic writes used for the handoff file, diff report and patched recipes
//! - [`backoff`] - retry-once-with-backoff wrapper for hosting API calls

pub mod backoff;
pub mod fs;

pub use backoff::retry_with_backoff;
pub use fs::{atomic_write, ensure_dir, safe_write};
