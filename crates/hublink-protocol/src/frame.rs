//! Frames exchanged by stream transports.
//!
//! A session starts with a `login` frame answered by a `login_reply`; after a
//! successful login both sides exchange `data` frames until one of them sends
//! `logout` or closes the stream.

use hublink_core::ConnectionError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolResult;
use crate::types::Envelope;

/// Data type tag of frames carrying an [`Envelope`].
pub const DATA_TYPE_MESSAGE: &str = "hmessage";

/// A transport-level frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum Frame {
    /// Opens a session.
    Login {
        /// Full identity (`user@domain/resource`).
        identity: String,
        password: String,
    },

    /// Server answer to `login`; `error` is `no_error` on success.
    LoginReply {
        error: ConnectionError,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Application data, tagged with its data type.
    Data {
        #[serde(rename = "type")]
        kind: String,
        data: Value,
    },

    /// Closes the session.
    Logout,
}

impl Frame {
    /// Creates a login frame.
    pub fn login(identity: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Login {
            identity: identity.into(),
            password: password.into(),
        }
    }

    /// Creates a successful login reply.
    pub fn login_accepted() -> Self {
        Self::LoginReply {
            error: ConnectionError::NoError,
            message: None,
        }
    }

    /// Creates a rejected login reply.
    pub fn login_rejected(error: ConnectionError, message: impl Into<String>) -> Self {
        Self::LoginReply {
            error,
            message: Some(message.into()),
        }
    }

    /// Wraps an envelope in a data frame.
    pub fn data(envelope: &Envelope) -> ProtocolResult<Self> {
        Ok(Self::Data {
            kind: DATA_TYPE_MESSAGE.to_string(),
            data: serde_json::to_value(envelope)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_serde() {
        let frame = Frame::login("alice@hub/laptop", "secret");
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(
            json,
            r#"{"frame":"login","identity":"alice@hub/laptop","password":"secret"}"#
        );
    }

    #[test]
    fn login_reply_serde() {
        let json = serde_json::to_string(&Frame::login_accepted()).unwrap();
        assert_eq!(json, r#"{"frame":"login_reply","error":"no_error"}"#);

        let parsed: Frame =
            serde_json::from_str(r#"{"frame":"login_reply","error":"auth_failed","message":"bad password"}"#)
                .unwrap();
        assert_eq!(
            parsed,
            Frame::login_rejected(ConnectionError::AuthFailed, "bad password")
        );
    }

    #[test]
    fn data_frame_carries_envelope() {
        let envelope = Envelope::new("#chat@hub", "chat", Value::from("hello"));
        let frame = Frame::data(&envelope).unwrap();

        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["frame"], "data");
        assert_eq!(value["type"], DATA_TYPE_MESSAGE);
        assert_eq!(value["data"]["actor"], "#chat@hub");
        assert_eq!(value["data"]["payload"], "hello");
    }

    #[test]
    fn logout_serde() {
        let parsed: Frame = serde_json::from_str(r#"{"frame":"logout"}"#).unwrap();
        assert_eq!(parsed, Frame::Logout);
    }
}
