//! Connection status and status events.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Session connection status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// A connection attempt is in flight.
    Connecting,
    /// The session is established.
    Connected,
    /// A disconnection is in flight.
    Disconnecting,
    /// No session.
    #[default]
    Disconnected,
}

impl ConnectionStatus {
    /// Returns the numeric wire code of the status.
    pub fn code(&self) -> u8 {
        match self {
            Self::Connecting => 1,
            Self::Connected => 2,
            Self::Disconnecting => 5,
            Self::Disconnected => 6,
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
            Self::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

/// Error code attached to a status event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionError {
    /// No error.
    #[default]
    NoError,
    /// The identity is not `user@domain[/resource]`.
    JidMalformat,
    /// The server did not answer in time.
    ConnTimeout,
    /// The server rejected the credentials.
    AuthFailed,
    /// Attaching to an existing session failed.
    AttachFailed,
    /// `connect` was called on a connected session.
    AlreadyConnected,
    /// Low-level transport failure.
    TechError,
    /// `disconnect` was called without a session.
    NotConnected,
    /// A connect or disconnect is already running.
    ConnProgress,
    /// No usable endpoint could be resolved.
    EndpointMalformat,
}

impl ConnectionError {
    /// Returns the numeric wire code of the error.
    pub fn code(&self) -> u8 {
        match self {
            Self::NoError => 0,
            Self::JidMalformat => 1,
            Self::ConnTimeout => 2,
            Self::AuthFailed => 3,
            Self::AttachFailed => 4,
            Self::AlreadyConnected => 5,
            Self::TechError => 6,
            Self::NotConnected => 7,
            Self::ConnProgress => 8,
            Self::EndpointMalformat => 9,
        }
    }

    /// Returns a human-readable description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NoError => "No error",
            Self::JidMalformat => "The identity is malformed",
            Self::ConnTimeout => "The connection timed out",
            Self::AuthFailed => "Authentication failed",
            Self::AttachFailed => "Attaching to the session failed",
            Self::AlreadyConnected => "Already connected",
            Self::TechError => "A technical error occurred",
            Self::NotConnected => "Not connected",
            Self::ConnProgress => "A connection transition is already in progress",
            Self::EndpointMalformat => "The endpoint is malformed",
        }
    }

    /// Returns true unless this is [`ConnectionError::NoError`].
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::NoError)
    }
}

/// A connection status change, or a rejected status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// Status the session is in.
    pub status: ConnectionStatus,
    /// Error code, [`ConnectionError::NoError`] for plain transitions.
    pub error: ConnectionError,
    /// Low-level description of the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusEvent {
    /// Creates a status event.
    pub fn new(status: ConnectionStatus, error: ConnectionError, message: Option<String>) -> Self {
        Self {
            status,
            error,
            message,
        }
    }

    /// Creates an error-free transition event.
    pub fn transition(status: ConnectionStatus) -> Self {
        Self::new(status, ConnectionError::NoError, None)
    }

    /// Creates an event carrying an error.
    pub fn error(
        status: ConnectionStatus,
        error: ConnectionError,
        message: impl Into<String>,
    ) -> Self {
        Self::new(status, error, Some(message.into()))
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status)?;
        if self.error.is_error() {
            write!(f, " ({})", self.error.description())?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}
