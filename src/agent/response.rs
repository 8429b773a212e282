//! Reasoning provider errors

use thiserror::Error;

/// Error types for reasoning provider calls
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReasoningError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),

    /// The reply did not contain a JSON object
    #[error("Malformed output: {0}")]
    MalformedOutput(String),

    #[error("Cancelled")]
    Cancelled,
}

impl ReasoningError {
    /// Whether another attempt with feedback may fix this
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReasoningError::MalformedOutput(_))
    }
}
