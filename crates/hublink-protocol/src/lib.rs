//! Envelope model and wire framing for hublink.
//!
//! Every unit exchanged with the server is an [`Envelope`]: an actor
//! (destination), a type tag, a JSON payload and optional correlation data.
//! Typed payloads ([`Command`], [`CommandResult`], [`Ack`], [`Alert`],
//! [`Measure`], [`ConvState`]) are carried as JSON under their type tag.
//!
//! # Wire format
//!
//! Stream transports exchange [`Frame`]s as length-prefixed JSON:
//! - 4 bytes: message length (u32, big-endian)
//! - N bytes: JSON payload
//!
//! # Example
//!
//! ```rust
//! use hublink_protocol::{build_command, decode_message, encode_message, Envelope, Frame};
//!
//! let envelope = build_command("session", "hgetsubscriptions", None, None).unwrap();
//! let bytes = encode_message(&Frame::data(&envelope).unwrap()).unwrap();
//! let decoded: Frame = decode_message(&bytes).unwrap();
//! assert!(matches!(decoded, Frame::Data { .. }));
//! ```

mod builder;
mod error;
mod frame;
mod framing;
mod types;

pub use builder::{
    MessageOptions, build_ack, build_alert, build_command, build_conv_state, build_measure,
    build_message, build_result,
};
pub use error::{ProtocolError, ProtocolResult};
pub use frame::{DATA_TYPE_MESSAGE, Frame};
pub use framing::{PREFIX_LEN, decode_message, decode_payload, encode_message, frame_len};
pub use types::{
    Ack, AckValue, Alert, Command, CommandResult, ConvState, Envelope, GeoLocation, Measure,
    ResultStatus, api_ref, type_tags,
};

/// Maximum message size (1 MB).
pub const MAX_MESSAGE_SIZE: u32 = 1024 * 1024;
