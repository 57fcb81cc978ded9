//! Client error types.

use std::io;

use hublink_protocol::{ProtocolError, ResultStatus};
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors reported synchronously by the client.
///
/// State errors (connecting twice, disconnecting without a session) are not
/// errors here: they are reported as status events.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The session is not connected.
    #[error("not connected")]
    NotConnected,

    /// A mandatory attribute is missing or empty.
    #[error("missing mandatory attribute: {0}")]
    MissingAttr(&'static str),

    /// Envelope building or framing failed.
    #[error("Protocol error: {0}")]
    Protocol(ProtocolError),

    /// IO error (socket, config file).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A secret reference could not be resolved.
    #[error("Secret error: {message}")]
    Secret { message: String },

    /// No tokio runtime is available to run background tasks.
    #[error("no tokio runtime: {0}")]
    Runtime(String),

    /// A correlated request was dropped before a reply or timeout.
    #[error("request {msgid} was dropped without a reply")]
    Dropped { msgid: String },
}

impl ClientError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a secret resolution error.
    pub fn secret(message: impl Into<String>) -> Self {
        Self::Secret {
            message: message.into(),
        }
    }

    /// Maps the error onto the result status a server would have answered.
    pub fn result_status(&self) -> ResultStatus {
        match self {
            Self::NotConnected => ResultStatus::NotConnected,
            Self::MissingAttr(_) => ResultStatus::MissingAttr,
            Self::Protocol(ProtocolError::InvalidAttr { .. }) => ResultStatus::InvalidAttr,
            _ => ResultStatus::TechError,
        }
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::MissingAttr(attr) => Self::MissingAttr(attr),
            other => Self::Protocol(other),
        }
    }
}
