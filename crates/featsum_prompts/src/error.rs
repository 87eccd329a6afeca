//! Error types for prompt templates.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for prompt operations.
pub type PromptResult<T> = Result<T, PromptError>;

/// Errors that can occur while loading prompt templates.
#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Prompt template not found: {0}")]
    NotFound(String),

    #[error("Prompt template directory does not exist: {0}")]
    MissingDirectory(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
