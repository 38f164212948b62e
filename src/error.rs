//! Error types for scrollwatch.

use thiserror::Error;

/// Main error type for scrollwatch operations.
#[derive(Error, Debug)]
pub enum ScrollwatchError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A timing wrapper was created outside of a Tokio runtime
    #[error("No Tokio runtime available: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for ScrollwatchError {
    fn from(err: config::ConfigError) -> Self {
        ScrollwatchError::Config(err.to_string())
    }
}

/// Result type alias for scrollwatch operations.
pub type Result<T> = std::result::Result<T, ScrollwatchError>;
