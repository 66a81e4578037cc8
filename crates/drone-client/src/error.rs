//! Error types for drone-client

use thiserror::Error;

/// Errors returned by a remote CI client.
///
/// `NotFound` is a durable answer from the server. Every other variant is
/// something a retry may resolve.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The requested repository, branch or build does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The token was rejected
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Connection, TLS or timeout failure before a response arrived
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body did not match the expected shape
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Server URL could not be used to build requests
    #[error("invalid server URL: {0}")]
    InvalidServer(String),
}

impl ClientError {
    /// Whether the server answered that the thing does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else if err.is_builder() {
            ClientError::InvalidServer(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}
