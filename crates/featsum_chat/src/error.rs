//! Error types for the report pipeline and dialogue.

use std::path::PathBuf;

use featsum_data::DataError;
use featsum_prompts::PromptError;
use thiserror::Error;

/// Failure of a single call to the LLM backend, classified at the transport
/// boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection reset: {0}")]
    ConnectionReset(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Whether the completion client may retry after this failure.
    ///
    /// Only network-class failures are retried. Rate limits and API errors
    /// fail fast.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::ConnectionReset(_) | Self::Network(_)
        )
    }

    /// Short tag for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::ConnectionReset(_) => "connection_reset",
            Self::Network(_) => "network",
            Self::RateLimited(_) => "rate_limited",
            Self::Api { .. } => "api",
            Self::Decode(_) => "decode",
            Self::Other(_) => "other",
        }
    }

    /// Classify a reqwest failure.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout(err.to_string());
        }
        if is_connection_reset(err) {
            return Self::ConnectionReset(err.to_string());
        }
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        if err.is_builder() {
            return Self::Other(err.to_string());
        }
        Self::Network(err.to_string())
    }
}

fn is_connection_reset(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionReset {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

/// Errors surfaced by the completion client.
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("LLM not configured. Set OPENAI_API_KEY or ANTHROPIC_API_KEY")]
    NotConfigured,

    #[error("Invalid completion request: {0}")]
    InvalidRequest(String),

    #[error("Empty response from the model")]
    EmptyResponse,

    #[error("Completion failed after {attempts} attempt(s): {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: TransportError,
    },
}

/// Errors that cross the report pipeline boundary.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("No data found for selected categories: {}", .0.join(", "))]
    NoData(Vec<String>),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Errors from the dialogue layer and settings.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Cannot load data: {0}")]
    Data(#[from] DataError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("Invalid settings file {path}: {message}")]
    Settings { path: PathBuf, message: String },

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for chat operations
pub type ChatResult<T> = Result<T, ChatError>;
