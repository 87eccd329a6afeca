//! Error types for data ingestion.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for data operations.
pub type DataResult<T> = Result<T, DataError>;

/// Errors raised while loading the tabular data source.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Data file not found: {0}")]
    NotFound(PathBuf),

    #[error("Unsupported data file format: {0}")]
    UnsupportedFormat(String),

    #[error("Unable to read workbook {path}: {message}")]
    Workbook { path: PathBuf, message: String },

    #[error("Data file is empty: {0}")]
    Empty(PathBuf),

    #[error("Missing required columns: {}. Found columns: {}", missing.join(", "), found.join(", "))]
    MissingColumns {
        missing: Vec<String>,
        found: Vec<String>,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
