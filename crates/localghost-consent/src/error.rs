//! Consent coordination error types.

use thiserror::Error;

/// Errors that can occur while coordinating a consent decision.
#[derive(Debug, Error)]
pub enum ConsentError {
    /// Minting the bearer token for an approved grant failed.
    #[error("failed to mint token: {0}")]
    Token(#[from] localghost_crypto::CryptoError),

    /// Persisting the grant (or its audit entry) failed.
    #[error("failed to persist grant: {0}")]
    Store(#[from] localghost_storage::StorageError),
}

/// Result type for consent coordination.
pub type CoordinatorResult<T> = Result<T, ConsentError>;
