//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while configuring logging.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The requested log directive or filter could not be parsed.
    #[error("invalid logging configuration: {0}")]
    ConfigError(String),

    /// The global tracing subscriber could not be installed (most often
    /// because one was already installed).
    #[error("failed to initialize logging: {0}")]
    InitError(String),

    /// Writing to the configured log file failed.
    #[error("log file I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
