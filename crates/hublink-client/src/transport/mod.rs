//! Transport boundary.
//!
//! A transport owns the network side of a session. The client drives it
//! through [`Transport`] and hears back through [`TransportDelegate`]; every
//! call returns immediately and results arrive later on the delegate.

mod stream;

use std::sync::Arc;
use std::time::Duration;

use hublink_core::{ConnectionError, ConnectionStatus, Endpoint, Identity};
use hublink_protocol::Envelope;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::runtime::Handle;

pub use stream::StreamTransport;
#[cfg(test)]
pub(crate) use stream::{read_frame, write_frame};

/// Callbacks a transport invokes into the session.
pub trait TransportDelegate: Send + Sync {
    /// Reports a status change.
    ///
    /// Called exactly once per connect attempt (CONNECTED, or DISCONNECTED
    /// with an error), and with DISCONNECTED when an established session ends.
    fn on_status(&self, status: ConnectionStatus, error: ConnectionError, message: Option<String>);

    /// Delivers inbound data tagged with its data type.
    fn on_data(&self, kind: &str, data: Value);
}

/// A bidirectional channel to the server.
pub trait Transport: Send + Sync {
    /// Starts a connection attempt.
    fn connect(&self, delegate: Arc<dyn TransportDelegate>, options: TransportOptions);

    /// Starts closing the session.
    fn disconnect(&self);

    /// Queues an envelope for transmission. Failures are only logged.
    fn send_envelope(&self, envelope: Envelope);
}

/// Everything a transport needs for one connection attempt.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub identity: Identity,
    pub password: String,
    pub endpoint: Endpoint,
    pub connect_timeout: Duration,
}

/// Transport implementations selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Length-prefixed frames over TCP.
    #[default]
    Tcp,
    /// Length-prefixed frames over a unix domain socket.
    Unix,
}

impl TransportKind {
    /// Returns true if this transport can reach `endpoint`.
    pub fn supports(&self, endpoint: &Endpoint) -> bool {
        matches!(
            (self, endpoint),
            (Self::Tcp, Endpoint::Stream { .. }) | (Self::Unix, Endpoint::Unix { .. })
        )
    }

    /// Creates the transport, spawning its tasks on `runtime`.
    pub fn build(self, runtime: Handle) -> Arc<dyn Transport> {
        Arc::new(StreamTransport::new(self, runtime))
    }
}
