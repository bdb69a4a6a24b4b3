//! Generation errors

use thiserror::Error;

/// Failure of a single generation call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// Request never produced a response (connect, timeout, body read)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider answered with a non-success status
    #[error("Provider error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Provider answered but with no usable content
    #[error("Provider returned an empty completion")]
    EmptyResponse,

    #[error("Missing API key: environment variable {0} is not set")]
    MissingApiKey(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GenerationError::Transport(format!("request timed out: {}", e))
        } else {
            GenerationError::Transport(e.to_string())
        }
    }
}
