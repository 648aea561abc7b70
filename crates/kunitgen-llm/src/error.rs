//! Error types for kunitgen-llm

use thiserror::Error;

use kunitgen_core::CollaboratorError;

/// Errors raised while talking to a chat completion endpoint
#[derive(Error, Debug)]
pub enum LlmError {
    /// API key variable is unset or empty
    #[error("API key not found in environment variable {0}")]
    MissingApiKey(String),

    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Request exceeded the client timeout
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// Non-success status from the endpoint
    #[error("API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// Body could not be decoded
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Response carried no choices or no content
    #[error("response contained no completion")]
    EmptyCompletion,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Http(err.to_string())
    }
}

impl From<LlmError> for CollaboratorError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::EmptyCompletion => CollaboratorError::EmptyResponse,
            other => CollaboratorError::Request(other.to_string()),
        }
    }
}
