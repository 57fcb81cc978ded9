//! Core types: identities, endpoints, connection status, tracing

pub mod endpoint;
pub mod identity;
pub mod status;
pub mod tracing;

pub use endpoint::{DEFAULT_PORT, Endpoint, EndpointError, pick_endpoint};
pub use identity::{Identity, IdentityError};
pub use status::{ConnectionError, ConnectionStatus, StatusEvent};
pub use self::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
