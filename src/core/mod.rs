//! Core types shared by every pipeline stage.
//!
//! Currently this is the error taxonomy; see [`error`] for the variants and
//! the conversion used by the binary to print operator-facing messages.

pub mod error;

pub use error::{ErrorContext, JarflowError, user_friendly_error};
