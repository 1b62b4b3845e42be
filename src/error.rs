//! Error types for the outlens engine

use thiserror::Error;

/// Result type alias for outlens operations
pub type Result<T> = std::result::Result<T, OutlensError>;

/// Main error type for the outlens engine
#[derive(Error, Debug)]
pub enum OutlensError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Data error: {0}")]
    DataError(String),

    /// Classifier produced a weight outside [0, 1]. Never clamped silently,
    /// so upstream bugs surface immediately.
    #[error("Invalid outlier weight {weight} at row {row}: weights must lie in [0, 1]")]
    InvalidWeight { row: usize, weight: f64 },

    #[error("Unknown code {code} for column '{column}'")]
    UnknownCode { column: String, code: u32 },

    /// A code surfaced during explanation building that was never allocated.
    /// Indicates a bug in candidate generation, not a user-input problem.
    #[error("Encoding inconsistency: {0}")]
    EncodingInconsistency(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for OutlensError {
    fn from(err: serde_json::Error) -> Self {
        OutlensError::SerializationError(err.to_string())
    }
}
