//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while building, encoding or decoding messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A mandatory envelope attribute is missing or empty.
    #[error("missing mandatory attribute: {0}")]
    MissingAttr(&'static str),

    /// An attribute has a value outside its domain.
    #[error("invalid attribute {attr}: {reason}")]
    InvalidAttr { attr: &'static str, reason: String },

    /// Message exceeds maximum allowed size.
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: u32, max: u32 },

    /// JSON encoding or decoding failed.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Connection closed before the full message was received.
    #[error("incomplete message: expected {expected} bytes, got {received}")]
    IncompleteMessage { expected: usize, received: usize },

    /// Zero-length frame.
    #[error("empty message")]
    EmptyMessage,
}
