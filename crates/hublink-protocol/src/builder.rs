//! Envelope builders.
//!
//! Each builder validates the attributes its payload needs and returns
//! [`ProtocolError::MissingAttr`] naming the first one that is absent.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ProtocolError, ProtocolResult};
use crate::types::{
    Ack, AckValue, Alert, Command, CommandResult, ConvState, Envelope, GeoLocation, Measure,
    ResultStatus, type_tags,
};

/// Highest accepted envelope priority.
const MAX_PRIORITY: u8 = 5;

/// Optional envelope attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageOptions {
    pub reference: Option<String>,
    pub convid: Option<String>,
    pub priority: Option<u8>,
    pub relevance: Option<DateTime<Utc>>,
    pub persistent: Option<bool>,
    pub location: Option<GeoLocation>,
    pub author: Option<String>,
    pub headers: Option<Map<String, Value>>,
    /// Reply timeout in milliseconds.
    pub timeout: u64,
}

impl MessageOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the id this envelope replies to.
    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Builder: set the conversation id.
    pub fn convid(mut self, convid: impl Into<String>) -> Self {
        self.convid = Some(convid.into());
        self
    }

    /// Builder: set the priority (0 to 5).
    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Builder: set the relevance date.
    pub fn relevance(mut self, relevance: DateTime<Utc>) -> Self {
        self.relevance = Some(relevance);
        self
    }

    /// Builder: set persistence.
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = Some(persistent);
        self
    }

    /// Builder: set the location.
    pub fn location(mut self, location: GeoLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Builder: set the author.
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Builder: add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers
            .get_or_insert_with(Map::new)
            .insert(name.into(), value.into());
        self
    }

    /// Builder: set the reply timeout in milliseconds.
    pub fn timeout(mut self, millis: u64) -> Self {
        self.timeout = millis;
        self
    }
}

fn require<'a>(value: &'a str, attr: &'static str) -> ProtocolResult<&'a str> {
    if value.trim().is_empty() {
        return Err(ProtocolError::MissingAttr(attr));
    }
    Ok(value)
}

fn to_payload<T: Serialize>(payload: &T) -> ProtocolResult<Value> {
    Ok(serde_json::to_value(payload)?)
}

/// Builds an envelope for `actor` with any type tag and payload.
pub fn build_message(
    actor: &str,
    kind: Option<&str>,
    payload: Value,
    options: Option<MessageOptions>,
) -> ProtocolResult<Envelope> {
    let actor = require(actor, "actor")?;
    let options = options.unwrap_or_default();

    if let Some(priority) = options.priority
        && priority > MAX_PRIORITY
    {
        return Err(ProtocolError::InvalidAttr {
            attr: "priority",
            reason: format!("{priority} is above {MAX_PRIORITY}"),
        });
    }

    Ok(Envelope {
        actor: actor.to_string(),
        kind: kind.map(str::to_string),
        payload,
        reference: options.reference,
        convid: options.convid,
        priority: options.priority,
        relevance: options.relevance,
        persistent: options.persistent,
        location: options.location,
        author: options.author,
        headers: options.headers,
        timeout: options.timeout,
        ..Default::default()
    })
}

/// Builds an `hCommand` envelope.
pub fn build_command(
    actor: &str,
    cmd: &str,
    params: Option<Map<String, Value>>,
    options: Option<MessageOptions>,
) -> ProtocolResult<Envelope> {
    require(actor, "actor")?;
    let cmd = require(cmd, "cmd")?;
    let payload = to_payload(&Command {
        cmd: cmd.to_string(),
        params,
    })?;
    build_message(actor, Some(type_tags::COMMAND), payload, options)
}

/// Builds an `hResult` envelope answering the envelope `reference`.
pub fn build_result(
    actor: &str,
    reference: &str,
    status: ResultStatus,
    result: Value,
    options: Option<MessageOptions>,
) -> ProtocolResult<Envelope> {
    require(actor, "actor")?;
    let reference = require(reference, "ref")?;
    let payload = to_payload(&CommandResult {
        cmd: None,
        status,
        result,
    })?;
    let options = options.unwrap_or_default().reference(reference);
    build_message(actor, Some(type_tags::RESULT), payload, Some(options))
}

/// Builds an `hAck` envelope acknowledging the envelope `reference`.
pub fn build_ack(
    actor: &str,
    reference: &str,
    ack: AckValue,
    options: Option<MessageOptions>,
) -> ProtocolResult<Envelope> {
    require(actor, "actor")?;
    let reference = require(reference, "ref")?;
    let payload = to_payload(&Ack { ack })?;
    let options = options.unwrap_or_default().reference(reference);
    build_message(actor, Some(type_tags::ACK), payload, Some(options))
}

/// Builds an `hAlert` envelope.
pub fn build_alert(
    actor: &str,
    alert: &str,
    options: Option<MessageOptions>,
) -> ProtocolResult<Envelope> {
    require(actor, "actor")?;
    let alert = require(alert, "alert")?;
    let payload = to_payload(&Alert {
        alert: alert.to_string(),
    })?;
    build_message(actor, Some(type_tags::ALERT), payload, options)
}

/// Builds an `hMeasure` envelope.
pub fn build_measure(
    actor: &str,
    value: &str,
    unit: &str,
    options: Option<MessageOptions>,
) -> ProtocolResult<Envelope> {
    require(actor, "actor")?;
    let value = require(value, "value")?;
    let unit = require(unit, "unit")?;
    let payload = to_payload(&Measure {
        value: value.to_string(),
        unit: unit.to_string(),
    })?;
    build_message(actor, Some(type_tags::MEASURE), payload, options)
}

/// Builds an `hConvState` envelope setting the status of conversation `convid`.
pub fn build_conv_state(
    actor: &str,
    convid: &str,
    status: &str,
    options: Option<MessageOptions>,
) -> ProtocolResult<Envelope> {
    require(actor, "actor")?;
    let convid = require(convid, "convid")?;
    let status = require(status, "status")?;
    let payload = to_payload(&ConvState {
        status: status.to_string(),
    })?;
    let options = options.unwrap_or_default().convid(convid);
    build_message(actor, Some(type_tags::CONV_STATE), payload, Some(options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn missing(result: ProtocolResult<Envelope>) -> &'static str {
        match result {
            Err(ProtocolError::MissingAttr(attr)) => attr,
            other => panic!("expected MissingAttr, got {other:?}"),
        }
    }

    #[test]
    fn message_copies_options() {
        let options = MessageOptions::new()
            .convid("conv-1")
            .priority(3)
            .persistent(true)
            .author("bob@hub")
            .header("x-trace", "abc")
            .location(GeoLocation { lat: 48.8, lng: 2.3 })
            .timeout(1000);

        let envelope = build_message("#chat@hub", Some("chat"), json!("hi"), Some(options)).unwrap();
        assert_eq!(envelope.actor, "#chat@hub");
        assert_eq!(envelope.kind.as_deref(), Some("chat"));
        assert_eq!(envelope.convid.as_deref(), Some("conv-1"));
        assert_eq!(envelope.priority, Some(3));
        assert_eq!(envelope.persistent, Some(true));
        assert_eq!(envelope.author.as_deref(), Some("bob@hub"));
        assert_eq!(envelope.headers.unwrap()["x-trace"], "abc");
        assert_eq!(envelope.timeout, 1000);
        assert!(envelope.msgid.is_empty());
        assert!(envelope.publisher.is_none());
    }

    #[test]
    fn message_requires_actor() {
        assert_eq!(missing(build_message("", None, Value::Null, None)), "actor");
        assert_eq!(missing(build_message("   ", None, Value::Null, None)), "actor");
    }

    #[test]
    fn message_rejects_out_of_range_priority() {
        let result = build_message(
            "a@hub",
            None,
            Value::Null,
            Some(MessageOptions::new().priority(6)),
        );
        assert!(matches!(
            result,
            Err(ProtocolError::InvalidAttr { attr: "priority", .. })
        ));
    }

    #[test]
    fn command_payload() {
        let mut params = Map::new();
        params.insert("nbLastMsg".to_string(), json!(10));
        let envelope = build_command("#news@hub", "hgetlastmessages", Some(params), None).unwrap();

        let command = envelope.command().unwrap();
        assert_eq!(command.cmd, "hgetlastmessages");
        assert_eq!(command.params.unwrap()["nbLastMsg"], 10);
        assert_eq!(missing(build_command("#news@hub", "", None, None)), "cmd");
    }

    #[test]
    fn result_sets_reference() {
        let envelope =
            build_result("alice@hub", "req-1", ResultStatus::NoError, json!([1, 2]), None).unwrap();
        assert_eq!(envelope.reference.as_deref(), Some("req-1"));
        assert_eq!(envelope.result().unwrap().result, json!([1, 2]));
        assert_eq!(
            missing(build_result("alice@hub", "", ResultStatus::NoError, Value::Null, None)),
            "ref"
        );
    }

    #[test]
    fn ack_alert_measure_conv_state() {
        let ack = build_ack("alice@hub", "m-1", AckValue::Read, None).unwrap();
        assert_eq!(ack.payload, json!({"ack": "read"}));
        assert_eq!(ack.reference.as_deref(), Some("m-1"));

        let alert = build_alert("#ops@hub", "disk full", None).unwrap();
        assert_eq!(alert.payload, json!({"alert": "disk full"}));
        assert_eq!(missing(build_alert("#ops@hub", "", None)), "alert");

        let measure = build_measure("#temp@hub", "21.5", "celsius", None).unwrap();
        assert_eq!(measure.payload, json!({"value": "21.5", "unit": "celsius"}));
        assert_eq!(missing(build_measure("#temp@hub", "21.5", "", None)), "unit");

        let state = build_conv_state("#support@hub", "conv-9", "closed", None).unwrap();
        assert_eq!(state.convid.as_deref(), Some("conv-9"));
        assert_eq!(state.payload, json!({"status": "closed"}));
        assert_eq!(
            missing(build_conv_state("#support@hub", "", "closed", None)),
            "convid"
        );
    }
}
