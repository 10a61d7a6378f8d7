//! Record protocol vocabulary: topics, actions, event markers and messages.
//!
//! Wire layout of a record message (fields joined by the transport):
//! ```text
//! ┌───────┬────────┬──────────────────────────────────────┐
//! │ topic │ action │ data[0] │ data[1] │ ... │ data[n]    │
//! │ "R"   │ "U"    │ name    │ version │ json            │
//! └───────┴────────┴──────────────────────────────────────┘
//! ```
//!
//! Frames handed to a channel transport are bincode-encoded [`Message`]s.
//! PATCH payloads carry a one-letter type prefix so scalars survive the
//! string-only data fields (see [`typed`] / [`convert_typed`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    /// Record lifecycle and data messages
    Record,
    /// Client-side errors raised outside any record message
    Error,
}

impl Topic {
    /// Wire code of this topic.
    pub fn code(&self) -> &'static str {
        match self {
            Topic::Record => "R",
            Topic::Error => "X",
        }
    }

    /// Parse a wire code.
    pub fn from_code(code: &str) -> Result<Self, ProtocolError> {
        match code {
            "R" => Ok(Topic::Record),
            "X" => Ok(Topic::Error),
            other => Err(ProtocolError::UnknownCode(other.to_string())),
        }
    }
}

/// Record actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Acknowledgment of a previously sent request
    Ack,
    /// Full document snapshot from the authority
    Read,
    /// Request to read a record, creating it if needed
    CreateOrRead,
    /// Whole-document write
    Update,
    /// Path-scoped write
    Patch,
    /// Delete the record on the authority
    Delete,
    /// Subscribe to remote changes
    Subscribe,
    /// Stop receiving remote changes
    Unsubscribe,
    /// Request a full snapshot without subscribing
    Snapshot,
    /// Error reported by the authority
    Error,
}

impl Action {
    /// Wire code of this action.
    pub fn code(&self) -> &'static str {
        match self {
            Action::Ack => "A",
            Action::Read => "R",
            Action::CreateOrRead => "CR",
            Action::Update => "U",
            Action::Patch => "P",
            Action::Delete => "D",
            Action::Subscribe => "S",
            Action::Unsubscribe => "US",
            Action::Snapshot => "SN",
            Action::Error => "E",
        }
    }

    /// Parse a wire code.
    pub fn from_code(code: &str) -> Result<Self, ProtocolError> {
        match code {
            "A" => Ok(Action::Ack),
            "R" => Ok(Action::Read),
            "CR" => Ok(Action::CreateOrRead),
            "U" => Ok(Action::Update),
            "P" => Ok(Action::Patch),
            "D" => Ok(Action::Delete),
            "S" => Ok(Action::Subscribe),
            "US" => Ok(Action::Unsubscribe),
            "SN" => Ok(Action::Snapshot),
            "E" => Ok(Action::Error),
            other => Err(ProtocolError::UnknownCode(other.to_string())),
        }
    }
}

/// Event markers carried in `data[0]` of error messages, and the event
/// kinds surfaced through the client error channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Event {
    /// A write was rejected because the authority already holds that version
    VersionExists,
    /// The authority refused a request
    MessageDenied,
    /// No acknowledgment arrived before the deadline
    AckTimeout,
    /// No response arrived before the deadline
    ResponseTimeout,
    /// No delete acknowledgment arrived before the deadline
    DeleteTimeout,
    /// An inbound message could not be interpreted
    MessageParseError,
    /// An inbound message named a record nobody holds
    UnsolicitedMessage,
}

impl Event {
    /// Wire marker of this event.
    pub fn marker(&self) -> &'static str {
        match self {
            Event::VersionExists => "VERSION_EXISTS",
            Event::MessageDenied => "MESSAGE_DENIED",
            Event::AckTimeout => "ACK_TIMEOUT",
            Event::ResponseTimeout => "RESPONSE_TIMEOUT",
            Event::DeleteTimeout => "DELETE_TIMEOUT",
            Event::MessageParseError => "MESSAGE_PARSE_ERROR",
            Event::UnsolicitedMessage => "UNSOLICITED_MESSAGE",
        }
    }

    /// Parse a wire marker. Returns `None` for ordinary payload strings.
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "VERSION_EXISTS" => Some(Event::VersionExists),
            "MESSAGE_DENIED" => Some(Event::MessageDenied),
            "ACK_TIMEOUT" => Some(Event::AckTimeout),
            "RESPONSE_TIMEOUT" => Some(Event::ResponseTimeout),
            "DELETE_TIMEOUT" => Some(Event::DeleteTimeout),
            "MESSAGE_PARSE_ERROR" => Some(Event::MessageParseError),
            "UNSOLICITED_MESSAGE" => Some(Event::UnsolicitedMessage),
            _ => None,
        }
    }
}

/// A protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub topic: Topic,
    pub action: Action,
    pub data: Vec<String>,
}

impl Message {
    /// Create a message with arbitrary data fields.
    pub fn new(topic: Topic, action: Action, data: Vec<String>) -> Self {
        Self { topic, action, data }
    }

    /// Create a `READ` snapshot message.
    pub fn read(name: &str, version: i64, data: &Value) -> Self {
        Self::new(
            Topic::Record,
            Action::Read,
            vec![name.to_string(), version.to_string(), data.to_string()],
        )
    }

    /// Create a whole-document `UPDATE` message.
    pub fn update(name: &str, version: i64, data: &Value) -> Self {
        Self::new(
            Topic::Record,
            Action::Update,
            vec![name.to_string(), version.to_string(), data.to_string()],
        )
    }

    /// Create a path-scoped `PATCH` message.
    pub fn patch(name: &str, version: i64, path: &str, value: &Value) -> Self {
        Self::new(
            Topic::Record,
            Action::Patch,
            vec![
                name.to_string(),
                version.to_string(),
                path.to_string(),
                typed(value),
            ],
        )
    }

    /// Create an acknowledgment for `acked` on record `name`.
    pub fn ack(acked: Action, name: &str) -> Self {
        Self::new(
            Topic::Record,
            Action::Ack,
            vec![acked.code().to_string(), name.to_string()],
        )
    }

    /// Create a version conflict message.
    pub fn version_exists(name: &str, version: i64, data: &Value) -> Self {
        Self::new(
            Topic::Record,
            Action::Error,
            vec![
                Event::VersionExists.marker().to_string(),
                name.to_string(),
                version.to_string(),
                data.to_string(),
            ],
        )
    }

    /// Create a denial message for record `name`.
    pub fn denied(name: &str) -> Self {
        Self::new(
            Topic::Record,
            Action::Error,
            vec![Event::MessageDenied.marker().to_string(), name.to_string()],
        )
    }

    /// Data field at `index`.
    pub fn field(&self, index: usize) -> Result<&str, ProtocolError> {
        self.data
            .get(index)
            .map(String::as_str)
            .ok_or(ProtocolError::MissingField(index))
    }

    /// Data field at `index` parsed as a version number.
    pub fn version_field(&self, index: usize) -> Result<i64, ProtocolError> {
        let raw = self.field(index)?;
        raw.parse()
            .map_err(|_| ProtocolError::InvalidVersion(raw.to_string()))
    }

    /// Data field at `index` parsed as JSON.
    pub fn json_field(&self, index: usize) -> Result<Value, ProtocolError> {
        serde_json::from_str(self.field(index)?)
            .map_err(|e| ProtocolError::InvalidJson(e.to_string()))
    }

    /// Event marker in `data[0]`, if it carries one.
    pub fn event(&self) -> Option<Event> {
        self.data.first().and_then(|m| Event::from_marker(m))
    }

    /// Name of the record this message concerns.
    ///
    /// Acks and error markers put the name in `data[1]`; everything else in `data[0]`.
    pub fn record_name(&self) -> Option<&str> {
        let index = match self.action {
            Action::Ack => 1,
            _ if self.event().is_some() => 1,
            _ => 0,
        };
        self.data.get(index).map(String::as_str)
    }

    /// Serialize to binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ProtocolError::SerializationError(e.to_string()))
    }

    /// Deserialize from binary wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (msg, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
        Ok(msg)
    }
}

/// Encode a value with its type prefix for a PATCH payload.
pub fn typed(value: &Value) -> String {
    match value {
        Value::String(s) => format!("S{s}"),
        Value::Object(_) | Value::Array(_) => format!("O{value}"),
        Value::Number(n) => format!("N{n}"),
        Value::Bool(true) => "T".to_string(),
        Value::Bool(false) => "F".to_string(),
        Value::Null => "L".to_string(),
    }
}

/// Decode a type-prefixed PATCH payload.
pub fn convert_typed(raw: &str) -> Result<Value, ProtocolError> {
    let mut chars = raw.chars();
    let prefix = chars
        .next()
        .ok_or_else(|| ProtocolError::InvalidTypedValue(raw.to_string()))?;
    let body = chars.as_str();

    match prefix {
        'S' => Ok(Value::String(body.to_string())),
        'O' => serde_json::from_str(body)
            .map_err(|_| ProtocolError::InvalidTypedValue(raw.to_string())),
        'N' => serde_json::from_str::<serde_json::Number>(body)
            .map(Value::Number)
            .map_err(|_| ProtocolError::InvalidTypedValue(raw.to_string())),
        'T' => Ok(Value::Bool(true)),
        'F' => Ok(Value::Bool(false)),
        // Undefined has no JSON form
        'L' | 'U' => Ok(Value::Null),
        _ => Err(ProtocolError::InvalidTypedValue(raw.to_string())),
    }
}

/// Protocol errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    SerializationError(String),
    DeserializationError(String),
    MissingField(usize),
    InvalidVersion(String),
    InvalidJson(String),
    InvalidTypedValue(String),
    UnknownCode(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SerializationError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializationError(e) => write!(f, "Deserialization error: {e}"),
            Self::MissingField(i) => write!(f, "Missing data field {i}"),
            Self::InvalidVersion(v) => write!(f, "Invalid version: {v}"),
            Self::InvalidJson(e) => write!(f, "Invalid JSON payload: {e}"),
            Self::InvalidTypedValue(v) => write!(f, "Invalid typed value: {v}"),
            Self::UnknownCode(c) => write!(f, "Unknown wire code: {c}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_message_layout() {
        let msg = Message::update("user/1", 4, &json!({"name": "Ada"}));
        assert_eq!(msg.topic, Topic::Record);
        assert_eq!(msg.action, Action::Update);
        assert_eq!(msg.data, vec!["user/1", "4", r#"{"name":"Ada"}"#]);
        assert_eq!(msg.record_name(), Some("user/1"));
    }

    #[test]
    fn test_patch_message_is_typed() {
        let msg = Message::patch("user/1", 2, "age", &json!(36));
        assert_eq!(msg.data[2], "age");
        assert_eq!(msg.data[3], "N36");
    }

    #[test]
    fn test_ack_and_marker_name_position() {
        let ack = Message::ack(Action::Delete, "doc");
        assert_eq!(ack.record_name(), Some("doc"));
        assert_eq!(Action::from_code(ack.field(0).unwrap()).unwrap(), Action::Delete);

        let conflict = Message::version_exists("doc", 7, &json!({}));
        assert_eq!(conflict.event(), Some(Event::VersionExists));
        assert_eq!(conflict.record_name(), Some("doc"));
        assert_eq!(conflict.version_field(2).unwrap(), 7);
    }

    #[test]
    fn test_plain_payload_has_no_event() {
        let msg = Message::read("VERSION", 1, &json!({}));
        assert_eq!(msg.event(), None);
    }

    #[test]
    fn test_typed_values() {
        assert_eq!(typed(&json!("hi")), "Shi");
        assert_eq!(typed(&json!(true)), "T");
        assert_eq!(typed(&json!(false)), "F");
        assert_eq!(typed(&Value::Null), "L");
        assert_eq!(typed(&json!([1, 2])), "O[1,2]");

        assert_eq!(convert_typed("Shi").unwrap(), json!("hi"));
        assert_eq!(convert_typed("S").unwrap(), json!(""));
        assert_eq!(convert_typed("N3.5").unwrap(), json!(3.5));
        assert_eq!(convert_typed(r#"O{"a":1}"#).unwrap(), json!({"a": 1}));
        assert_eq!(convert_typed("U").unwrap(), Value::Null);
    }

    #[test]
    fn test_invalid_typed_values() {
        assert!(convert_typed("").is_err());
        assert!(convert_typed("Q1").is_err());
        assert!(convert_typed("Nabc").is_err());
        assert!(convert_typed("O{").is_err());
    }

    #[test]
    fn test_field_errors() {
        let msg = Message::new(Topic::Record, Action::Update, vec!["doc".into(), "x".into()]);
        assert_eq!(msg.field(5), Err(ProtocolError::MissingField(5)));
        assert_eq!(msg.version_field(1), Err(ProtocolError::InvalidVersion("x".into())));
        assert!(msg.json_field(0).is_err());
    }

    #[test]
    fn test_codes_roundtrip() {
        for action in [
            Action::Ack,
            Action::Read,
            Action::CreateOrRead,
            Action::Update,
            Action::Patch,
            Action::Delete,
            Action::Subscribe,
            Action::Unsubscribe,
            Action::Snapshot,
            Action::Error,
        ] {
            assert_eq!(Action::from_code(action.code()).unwrap(), action);
        }
        assert_eq!(Topic::from_code("R").unwrap(), Topic::Record);
        assert!(Action::from_code("??").is_err());
    }

    #[test]
    fn test_binary_frame() {
        let msg = Message::patch("a", 1, "b.c", &json!({"d": [1, 2]}));
        let bytes = msg.encode().unwrap();
        assert_eq!(Message::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_decode_invalid_bytes() {
        let garbage = vec![0xFF, 0xFE, 0xFD];
        assert!(Message::decode(&garbage).is_err());
    }
}
