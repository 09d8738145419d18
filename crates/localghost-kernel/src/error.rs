//! Kernel-level error types.

use thiserror::Error;

/// Errors that can occur while assembling or running the kernel.
#[derive(Debug, Error)]
pub enum KernelError {
    /// The persisted token-encryption secret could not be loaded or created.
    #[error("secret key unavailable: {0}")]
    Secret(#[from] localghost_crypto::CryptoError),

    /// The permission store could not be opened or a request against it
    /// failed.
    #[error("permission store error: {0}")]
    Store(#[from] localghost_storage::StorageError),

    /// Coordinating a consent decision failed.
    #[error("consent coordination error: {0}")]
    Consent(#[from] localghost_consent::ConsentError),

    /// A setting required to assemble the kernel was invalid.
    #[error("invalid setting: {0}")]
    Setting(#[from] localghost_core::CoreError),
}

/// Result type for kernel assembly and request admission.
pub type KernelResult<T> = Result<T, KernelError>;
