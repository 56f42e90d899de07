//! Payload parsing and event classification for Events API deliveries.
//!
//! Slack posts a JSON object to the webhook for every subscribed event. The
//! top-level `type` is either `url_verification` (the endpoint handshake) or
//! `event_callback`, with the actual event nested under `event`. This module
//! turns the raw body into an [`InboundPayload`] and decides what to do with
//! it via [`classify`].
//!
//! Field access is lenient throughout: a field that is missing or has the
//! wrong JSON type reads as absent, so a malformed payload is ignored rather
//! than rejected.

use serde_json::Value;
use tracing::debug;

use crate::error::ServerError;

/// A parsed webhook body.
///
/// # Examples
///
/// ```
/// use emma_server::dispatch::parse_payload;
///
/// let payload = parse_payload(br#"{"type":"url_verification","challenge":"abc123"}"#).unwrap();
/// assert_eq!(payload.payload_type.as_deref(), Some("url_verification"));
/// assert_eq!(payload.challenge.as_deref(), Some("abc123"));
/// assert!(payload.event.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundPayload {
    /// Top-level payload type (`url_verification`, `event_callback`, ...).
    pub payload_type: Option<String>,

    /// Verification token to echo back.
    pub challenge: Option<String>,

    /// Unique id of this delivery; identical across Slack's retries.
    pub event_id: Option<String>,

    /// The nested event, when `event` is a JSON object.
    pub event: Option<EventRecord>,
}

/// The inner event of an `event_callback` delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventRecord {
    /// Event type (`app_mention`, `message`, ...).
    pub event_type: Option<String>,

    /// Message subtype (e.g. `bot_message`). Plain user messages have none.
    pub subtype: Option<String>,

    /// Author's user id.
    pub user: Option<String>,

    /// Channel the event happened in.
    pub channel: Option<String>,

    /// Message text.
    pub text: Option<String>,

    /// Kind of conversation (`im` for direct messages).
    pub channel_type: Option<String>,

    /// Message timestamp.
    pub ts: Option<String>,
}

/// What the webhook should do with a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Endpoint handshake; the token must be echoed verbatim.
    VerificationChallenge(String),

    /// A mention or direct message that deserves a reply.
    Actionable(EventRecord),

    /// Anything else, including malformed payloads.
    Ignore,
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

impl InboundPayload {
    /// Builds a payload from an already-decoded JSON value.
    ///
    /// Non-object values produce an empty payload.
    pub fn from_value(value: &Value) -> Self {
        Self {
            payload_type: str_field(value, "type"),
            challenge: str_field(value, "challenge"),
            event_id: str_field(value, "event_id"),
            event: value.get("event").and_then(EventRecord::from_value),
        }
    }
}

impl EventRecord {
    /// Reads an event object field by field.
    ///
    /// Returns `None` when `value` is not a JSON object.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        Some(Self {
            event_type: str_field(value, "type"),
            subtype: str_field(value, "subtype"),
            user: str_field(value, "user"),
            channel: str_field(value, "channel"),
            text: str_field(value, "text"),
            channel_type: str_field(value, "channel_type"),
            ts: str_field(value, "ts"),
        })
    }

    /// Message text, or the empty string when absent.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    fn is_direct_message(&self) -> bool {
        self.event_type.as_deref() == Some("message") && self.channel_type.as_deref() == Some("im")
    }
}

/// Parses a raw request body.
///
/// # Errors
///
/// Returns `ServerError::BadRequest` if `body` is not valid JSON.
pub fn parse_payload(body: &[u8]) -> Result<InboundPayload, ServerError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ServerError::BadRequest(format!("body is not valid JSON: {e}")))?;
    Ok(InboundPayload::from_value(&value))
}

/// Decides how to handle a payload.
///
/// `app_mention` events are always actionable. `message` events are
/// actionable only in direct messages (`channel_type == "im"`); messages in
/// ordinary channels are ignored.
pub fn classify(payload: &InboundPayload) -> Classification {
    if payload.payload_type.as_deref() == Some("url_verification") {
        return Classification::VerificationChallenge(
            payload.challenge.clone().unwrap_or_default(),
        );
    }

    let Some(event) = payload.event.as_ref() else {
        debug!(payload_type = ?payload.payload_type, "No event in payload");
        return Classification::Ignore;
    };

    let actionable = match event.event_type.as_deref() {
        Some("app_mention") => true,
        Some("message") => event.is_direct_message(),
        _ => false,
    };

    if actionable {
        Classification::Actionable(event.clone())
    } else {
        debug!(
            event_type = ?event.event_type,
            channel_type = ?event.channel_type,
            "Ignoring event"
        );
        Classification::Ignore
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn classify_json(value: Value) -> Classification {
        classify(&InboundPayload::from_value(&value))
    }

    #[test]
    fn test_should_echo_verification_challenge() {
        let result = classify_json(json!({"type": "url_verification", "challenge": "abc123"}));
        assert_eq!(
            result,
            Classification::VerificationChallenge("abc123".into())
        );
    }

    #[test]
    fn test_should_echo_empty_challenge_when_missing() {
        let result = classify_json(json!({"type": "url_verification"}));
        assert_eq!(result, Classification::VerificationChallenge(String::new()));
    }

    #[test]
    fn test_should_echo_empty_challenge_when_not_a_string() {
        let result = classify_json(json!({"type": "url_verification", "challenge": 12345}));
        assert_eq!(result, Classification::VerificationChallenge(String::new()));
    }

    #[test]
    fn test_should_prefer_verification_over_event() {
        let result = classify_json(json!({
            "type": "url_verification",
            "challenge": "tok",
            "event": {"type": "app_mention", "channel": "C1"}
        }));
        assert_eq!(result, Classification::VerificationChallenge("tok".into()));
    }

    #[test]
    fn test_should_act_on_app_mention() {
        let result = classify_json(json!({
            "type": "event_callback",
            "event": {"type": "app_mention", "text": "hello bot", "user": "U1", "channel": "C1"}
        }));
        match result {
            Classification::Actionable(record) => {
                assert_eq!(record.channel.as_deref(), Some("C1"));
                assert_eq!(record.user.as_deref(), Some("U1"));
                assert_eq!(record.text(), "hello bot");
            }
            other => panic!("Expected Actionable, got {other:?}"),
        }
    }

    #[test]
    fn test_should_act_on_app_mention_regardless_of_other_fields() {
        for event in [
            json!({"type": "app_mention"}),
            json!({"type": "app_mention", "channel_type": "channel"}),
            json!({"type": "app_mention", "subtype": "bot_message", "user": 42}),
        ] {
            let result = classify_json(json!({"type": "event_callback", "event": event}));
            assert!(
                matches!(result, Classification::Actionable(_)),
                "event: {event}"
            );
        }
    }

    #[test]
    fn test_should_act_on_direct_message() {
        let result = classify_json(json!({
            "type": "event_callback",
            "event": {"type": "message", "channel_type": "im", "user": "U1", "channel": "D1", "text": "hi"}
        }));
        assert!(matches!(result, Classification::Actionable(_)));
    }

    #[test]
    fn test_should_ignore_channel_message() {
        for channel_type in ["channel", "group", "mpim"] {
            let result = classify_json(json!({
                "type": "event_callback",
                "event": {"type": "message", "channel_type": channel_type, "channel": "C1"}
            }));
            assert_eq!(result, Classification::Ignore, "channel_type: {channel_type}");
        }
    }

    #[test]
    fn test_should_ignore_message_without_channel_type() {
        let result = classify_json(json!({
            "type": "event_callback",
            "event": {"type": "message", "channel": "C1"}
        }));
        assert_eq!(result, Classification::Ignore);
    }

    #[test]
    fn test_should_ignore_other_event_types() {
        let result = classify_json(json!({
            "type": "event_callback",
            "event": {"type": "reaction_added", "user": "U1", "reaction": "thumbsup"}
        }));
        assert_eq!(result, Classification::Ignore);
    }

    #[test]
    fn test_should_ignore_malformed_payloads() {
        for value in [
            json!({}),
            json!([]),
            json!(42),
            json!(null),
            json!({"type": "event_callback"}),
            json!({"type": "event_callback", "event": "app_mention"}),
            json!({"type": "event_callback", "event": {"type": 7}}),
            json!({"type": 5, "challenge": "x"}),
        ] {
            assert_eq!(classify_json(value.clone()), Classification::Ignore, "payload: {value}");
        }
    }

    #[test]
    fn test_should_read_event_id() {
        let payload = InboundPayload::from_value(&json!({
            "type": "event_callback",
            "event_id": "Ev123",
            "event": {"type": "app_mention"}
        }));
        assert_eq!(payload.event_id.as_deref(), Some("Ev123"));
    }

    #[test]
    fn test_should_treat_non_string_fields_as_absent() {
        let record = EventRecord::from_value(&json!({
            "type": "message",
            "text": {"rich": true},
            "user": null,
            "channel": "D1"
        }))
        .expect("object");
        assert_eq!(record.text, None);
        assert_eq!(record.text(), "");
        assert_eq!(record.user, None);
        assert_eq!(record.channel.as_deref(), Some("D1"));
    }

    #[test]
    fn test_should_reject_invalid_json_body() {
        let err = parse_payload(b"not json").unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));
    }

    #[test]
    fn test_should_accept_non_object_json_body() {
        let payload = parse_payload(b"[1, 2, 3]").expect("parse");
        assert_eq!(payload, InboundPayload::default());
    }

    #[test]
    fn test_should_read_every_wrongly_typed_field_as_absent() {
        let record = EventRecord::from_value(&json!({
            "type": 1,
            "subtype": true,
            "user": ["U1"],
            "channel": {"id": "C1"},
            "text": {"rich": true},
            "channel_type": 2.5,
            "ts": null
        }))
        .expect("object");
        assert_eq!(record, EventRecord::default());
    }
}
