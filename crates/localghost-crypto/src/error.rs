//! Cryptographic error types.

use thiserror::Error;

/// Errors that can occur while minting tokens or handling the secret key.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The secret key read from disk was not exactly [`crate::SECRET_KEY_LEN`]
    /// bytes.
    #[error("invalid secret key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// Reading or writing the `.secret` file failed.
    #[error("secret key I/O failure: {0}")]
    SecretIo(String),

    /// Token claims could not be serialized before encryption.
    #[error("failed to encode token claims: {0}")]
    Encode(String),
}

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
