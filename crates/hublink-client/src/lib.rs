//! hublink client: sessions, request correlation and callback dispatch.
//!
//! ```no_run
//! use hublink_client::{Client, ClientConfig};
//!
//! # async fn run() -> hublink_client::ClientResult<()> {
//! let config = ClientConfig::load()?;
//! let credentials = config.credentials()?;
//!
//! let client = Client::new(config.options())?;
//! client.on_status(|event| println!("status: {event}"));
//! client.on_message(|envelope| println!("message from {}", envelope.actor));
//! client.connect(&credentials.identity, &credentials.password);
//!
//! client.subscribe("#news@hub.example.com", |reply| {
//!     println!("subscribed: {:?}", reply.result());
//! })?;
//! # Ok(())
//! # }
//! ```

mod client;
pub mod commands;
pub mod config;
mod dispatch;
pub mod error;
mod registry;
pub mod secret;
mod session;
pub mod transport;

pub use client::Client;
pub use config::{ClientConfig, ClientOptions, Credentials};
pub use error::{ClientError, ClientResult};
pub use registry::ReplyCallback;
pub use transport::{StreamTransport, Transport, TransportDelegate, TransportKind, TransportOptions};

pub use hublink_core::{ConnectionError, ConnectionStatus, Identity, StatusEvent};
pub use hublink_protocol::{Envelope, ResultStatus};
