//! Error types for Montage.

use thiserror::Error;

/// Main error type for pipeline operations.
#[derive(Error, Debug)]
pub enum MontageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A source could not be opened or probed.
    #[error("Source error: {0}")]
    Source(String),

    #[error("Decoder error: {0}")]
    Decoder(String),

    /// An edit would break clip placement rules. The scene is unchanged.
    #[error("Placement rejected: {0}")]
    Placement(String),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Not initialized: {0}")]
    NotInitialized(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for MontageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, MontageError>;
