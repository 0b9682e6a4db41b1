//! Provider error types and handling

use std::time::Duration;
use thiserror::Error;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur when talking to the chat-completion gateway
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Network or connection error
    #[error("Network error: {0}")]
    Network(String),

    /// Gateway answered with a non-2xx status
    #[error("HTTP error! status: {status}: {message}")]
    Http { status: u16, message: String },

    /// The session deadline passed before the response completed
    #[error("Request timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    /// The caller cancelled the session
    #[error("Request cancelled")]
    Cancelled,

    /// The request envelope is not valid
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Response could not be parsed
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Client configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Local history storage failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// An image was requested but the reply carried none
    #[error("No image generated")]
    NoImage,
}

impl ProviderError {
    /// HTTP status code, when the gateway answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this error is the caller's own cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            ProviderError::Network(format!("Connection failed: {}", err))
        } else if let Some(status) = err.status() {
            ProviderError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Parse(err.to_string())
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> Self {
        ProviderError::Storage(err.to_string())
    }
}
