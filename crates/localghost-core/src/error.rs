//! Shared error types for the authorization kernel.

use thiserror::Error;

/// Errors that can occur in core, non-storage, non-crypto operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A setting was missing or failed to parse from the environment.
    #[error("invalid setting {name}: {reason}")]
    InvalidSetting {
        /// Name of the offending setting.
        name: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
