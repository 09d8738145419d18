//! Storage error types.

use thiserror::Error;

/// Errors that can occur while reading or writing durable state.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database could not be opened, or its schema could not be created.
    #[error("failed to initialize database at {path}: {source}")]
    Init {
        /// Path to the database file.
        path: String,
        /// Underlying SQLite error.
        #[source]
        source: rusqlite::Error,
    },

    /// A read or write against an already-initialized database failed.
    #[error("database operation failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// A stored `permissions` JSON column could not be decoded.
    #[error("malformed permissions column: {0}")]
    MalformedPermissions(String),

    /// A stored `details` JSON column could not be decoded.
    #[error("malformed audit details column: {0}")]
    MalformedDetails(String),

    /// The parent directory of the database file could not be created.
    #[error("failed to create data directory {path}: {source}")]
    CreateDataDir {
        /// Path to the data directory.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
