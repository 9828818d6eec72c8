//! Error types for agentdeck-core

use thiserror::Error;

/// Main error type for the agentdeck-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// REST API error
    #[error("api error: {0}")]
    Api(String),

    /// Live stream transport error (socket closed, handshake failed)
    #[error("transport error: {0}")]
    Transport(String),

    /// A stream envelope that could not be decoded
    #[error("bad {kind} envelope: {message}")]
    Envelope { kind: String, message: String },

    /// Agent not found on the server
    #[error("agent not found: {0}")]
    AgentNotFound(String),
}

impl Error {
    pub(crate) fn envelope(kind: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Envelope {
            kind: kind.into(),
            message: message.to_string(),
        }
    }
}

/// Result type alias for agentdeck-core
pub type Result<T> = std::result::Result<T, Error>;
