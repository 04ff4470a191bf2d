//! Core types and error handling shared across the crate.

pub mod error;

pub use error::{ErrorContext, SandboxError, user_friendly_error};

/// Crate-wide result type defaulting to [`SandboxError`].
pub type Result<T, E = SandboxError> = std::result::Result<T, E>;
