//! Error types for the chartset library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Column missing from a frame
    #[error("Invalid column: {0}")]
    InvalidColumn(String),

    /// Fewer candidate rows than requested samples
    #[error("Insufficient population: requested {requested} rows but only {available} match")]
    InsufficientPopulation { available: usize, requested: usize },

    /// Images with different pixel counts in one dataset
    #[error("Dimension mismatch: expected {expected} pixels, got {actual} in {path:?}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        path: PathBuf,
    },

    /// Parallel inputs of different lengths
    #[error("Length mismatch: {left} files but {right} labels")]
    LengthMismatch { left: usize, right: usize },

    /// Image or dataset file does not exist
    #[error("File not found: {0:?}")]
    FileNotFound(PathBuf),

    /// File exists but cannot be decoded
    #[error("Unsupported format: {path:?} ({reason})")]
    UnsupportedFormat { path: PathBuf, reason: String },

    /// A single window could not be rendered
    #[error("Render failure for {window}: {reason}")]
    RenderFailure { window: String, reason: String },

    /// Upload did not complete
    #[error("Upload of {path:?} to bucket '{bucket}' failed after {attempts} attempt(s): {reason}")]
    UploadFailure {
        bucket: String,
        path: PathBuf,
        attempts: u32,
        reason: String,
    },

    /// Indicator library rejected its parameters
    #[error("Indicator error: {0}")]
    Indicator(String),

    /// Invalid parameter or configuration value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Training call on a session that was closed
    #[error("Modelling session is closed")]
    SessionClosed,

    /// TOML configuration error
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Image encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors that abort a pipeline stage because the caller broke a contract
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::InvalidColumn(_)
                | Error::InsufficientPopulation { .. }
                | Error::LengthMismatch { .. }
                | Error::DimensionMismatch { .. }
        )
    }

    /// Errors worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::UploadFailure { .. } | Error::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_classification() {
        assert!(Error::InvalidColumn("firm".into()).is_structural());
        assert!(Error::LengthMismatch { left: 2, right: 1 }.is_structural());
        assert!(!Error::SessionClosed.is_structural());
    }

    #[test]
    fn test_retryable() {
        let err = Error::UploadFailure {
            bucket: "b".into(),
            path: PathBuf::from("a.jpg"),
            attempts: 3,
            reason: "timeout".into(),
        };
        assert!(err.is_retryable());
        assert!(!Error::SessionClosed.is_retryable());
    }
}
