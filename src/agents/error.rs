//! Error types for the assistant bridge

use thiserror::Error;

/// Errors that can occur during assistant operations
#[derive(Debug, Error)]
pub enum AgentError {
    /// Transport (assistant API) error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Tool call arguments could not be decoded
    #[error("Argument decode error: {0}")]
    Decode(String),

    /// No function registered under the requested name
    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    /// Knowledge store synchronization error
    #[error("Knowledge store error: {0}")]
    Knowledge(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors specific to the assistant transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// API error
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Authentication error
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Local file error while uploading or downloading
    #[error("File error: {0}")]
    File(String),

    /// Timeout
    #[error("Request timed out")]
    Timeout,
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Network(format!("Connection error: {}", err))
        } else if err.is_decode() {
            TransportError::Parse(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        AgentError::Internal(format!("IO error: {}", err))
    }
}

/// Result type alias for assistant operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;
