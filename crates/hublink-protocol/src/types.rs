//! Envelope and payload types.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Type tags of the payloads this crate knows about.
pub mod type_tags {
    /// [`Command`](super::Command) payload.
    pub const COMMAND: &str = "hCommand";
    /// [`CommandResult`](super::CommandResult) payload; reply-only.
    pub const RESULT: &str = "hResult";
    /// [`Ack`](super::Ack) payload.
    pub const ACK: &str = "hAck";
    /// [`Alert`](super::Alert) payload.
    pub const ALERT: &str = "hAlert";
    /// [`Measure`](super::Measure) payload.
    pub const MEASURE: &str = "hMeasure";
    /// [`ConvState`](super::ConvState) payload.
    pub const CONV_STATE: &str = "hConvState";
}

/// Returns the correlation key carried by a `ref` value.
///
/// Servers may suffix the id they echo back (`<msgid>#<suffix>`); only the
/// part before the first `#` identifies the original request.
pub fn api_ref(reference: &str) -> &str {
    reference
        .split_once('#')
        .map_or(reference, |(key, _)| key)
}

/// A message unit exchanged with the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Message id; assigned by the client when a reply is expected.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msgid: String,

    /// Destination: a channel, a user identity or `session`.
    #[serde(default)]
    pub actor: String,

    /// Conversation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convid: Option<String>,

    /// Id of the envelope this one replies to.
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    /// Payload type tag.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Priority, 0 (lowest) to 5.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,

    /// Date after which the envelope is no longer relevant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<DateTime<Utc>>,

    /// Whether the server should store the envelope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent: Option<bool>,

    /// Where the envelope was emitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoLocation>,

    /// Author, when different from the publisher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Bare identity of the sender; stamped by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    /// Publication date set by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,

    /// Free-form headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Map<String, Value>>,

    /// Payload, interpreted according to `kind`.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,

    /// Milliseconds to wait for a reply; 0 means no reply is expected.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub timeout: u64,

    /// Send date; stamped by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent: Option<DateTime<Utc>>,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

impl Envelope {
    /// Creates an envelope for `actor` with the given type tag and payload.
    pub fn new(actor: impl Into<String>, kind: impl Into<String>, payload: Value) -> Self {
        Self {
            actor: actor.into(),
            kind: Some(kind.into()),
            payload,
            ..Default::default()
        }
    }

    /// Synthesizes a result envelope replying to `reference`.
    ///
    /// Used for replies the client produces itself (timeouts, forced
    /// failures) so that callbacks see the same shape as server replies.
    pub fn result_error(
        reference: impl Into<String>,
        status: ResultStatus,
        message: impl Into<String>,
    ) -> Self {
        let result = CommandResult::error(status, message);
        Self {
            reference: Some(reference.into()),
            kind: Some(type_tags::RESULT.to_string()),
            payload: serde_json::to_value(result).unwrap_or(Value::Null),
            ..Default::default()
        }
    }

    /// Returns true if the type tag equals `tag`, ignoring ASCII case.
    pub fn is_type(&self, tag: &str) -> bool {
        self.kind
            .as_deref()
            .is_some_and(|kind| kind.eq_ignore_ascii_case(tag))
    }

    /// Returns true for reply-only envelopes (`hResult`).
    pub fn is_result(&self) -> bool {
        self.is_type(type_tags::RESULT)
    }

    /// Returns the correlation key of the `ref` field, if any.
    pub fn correlation_key(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .map(api_ref)
            .filter(|key| !key.is_empty())
    }

    /// Returns the reply timeout, `None` when no reply is expected.
    pub fn reply_timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_millis(self.timeout))
    }

    /// Decodes the payload of an `hResult` envelope.
    pub fn result(&self) -> Option<CommandResult> {
        self.decode_payload(type_tags::RESULT)
    }

    /// Decodes the payload of an `hCommand` envelope.
    pub fn command(&self) -> Option<Command> {
        self.decode_payload(type_tags::COMMAND)
    }

    fn decode_payload<T: serde::de::DeserializeOwned>(&self, tag: &str) -> Option<T> {
        if !self.is_type(tag) {
            return None;
        }
        serde_json::from_value(self.payload.clone()).ok()
    }
}

/// Result status codes carried by `hResult` payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ResultStatus {
    /// The command succeeded.
    NoError,
    /// Server-side technical failure.
    TechError,
    /// The client is not connected.
    NotConnected,
    /// The publisher may not perform the command.
    NotAuthorized,
    /// A mandatory attribute is missing.
    MissingAttr,
    /// An attribute value is invalid.
    InvalidAttr,
    /// The target is not available.
    NotAvailable,
    /// No reply arrived within the timeout.
    ExecTimeout,
}

impl ResultStatus {
    /// Returns the numeric wire code.
    pub fn code(&self) -> u8 {
        match self {
            Self::NoError => 0,
            Self::TechError => 1,
            Self::NotConnected => 3,
            Self::NotAuthorized => 5,
            Self::MissingAttr => 6,
            Self::InvalidAttr => 7,
            Self::NotAvailable => 9,
            Self::ExecTimeout => 10,
        }
    }

    /// Returns a human-readable description of the status.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NoError => "Command executed",
            Self::TechError => "A technical error occurred",
            Self::NotConnected => "Not connected",
            Self::NotAuthorized => "Not authorized",
            Self::MissingAttr => "A mandatory attribute is missing",
            Self::InvalidAttr => "An attribute is invalid",
            Self::NotAvailable => "Not available",
            Self::ExecTimeout => "The command timed out",
        }
    }
}

impl From<ResultStatus> for u8 {
    fn from(status: ResultStatus) -> Self {
        status.code()
    }
}

impl TryFrom<u8> for ResultStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::NoError),
            1 => Ok(Self::TechError),
            3 => Ok(Self::NotConnected),
            5 => Ok(Self::NotAuthorized),
            6 => Ok(Self::MissingAttr),
            7 => Ok(Self::InvalidAttr),
            9 => Ok(Self::NotAvailable),
            10 => Ok(Self::ExecTimeout),
            other => Err(format!("unknown result status code {other}")),
        }
    }
}

/// A command addressed to the server or to another actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Command name.
    pub cmd: String,
    /// Command parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

/// The outcome of a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Name of the command this result answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    /// Outcome.
    pub status: ResultStatus,
    /// Command-specific result.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub result: Value,
}

impl CommandResult {
    /// Creates an error result with an `errorMsg` description.
    pub fn error(status: ResultStatus, message: impl Into<String>) -> Self {
        Self {
            cmd: None,
            status,
            result: serde_json::json!({ "errorMsg": message.into() }),
        }
    }

    /// Returns the `errorMsg` description, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.result.get("errorMsg").and_then(Value::as_str)
    }
}

/// Acknowledgement values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckValue {
    /// Received on at least one device.
    Recv,
    /// Read by the participant.
    Read,
}

/// Acknowledgement payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub ack: AckValue,
}

/// Alert payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub alert: String,
}

/// Measure payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
    pub value: String,
    pub unit: String,
}

/// Conversation state payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvState {
    pub status: String,
}

/// A geographic position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub lat: f64,
    pub lng: f64,
}
