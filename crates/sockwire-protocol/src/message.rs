//! In-memory representation of one protocol frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ProtocolError;

/// Frame type.
///
/// The numeric codes (`0..=7`) are the ordinal order used by existing peers
/// when a type travels outside the wire text (e.g. in logs or configuration).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MessageType {
    /// Connection options sent by the server after the upgrade.
    Open = 0,
    /// Close the connection.
    Close = 1,
    /// Heartbeat request.
    Ping = 2,
    /// Heartbeat response.
    Pong = 3,
    /// Empty message (namespace connect acknowledgement).
    Empty = 4,
    /// One-way event, no response expected.
    Emit = 5,
    /// Event expecting a correlated response.
    AckRequest = 6,
    /// Response to an [`MessageType::AckRequest`].
    AckResponse = 7,
}

impl MessageType {
    /// Whether frames of this type carry an ack id.
    pub fn has_ack_id(self) -> bool {
        matches!(self, Self::AckRequest | Self::AckResponse)
    }

    /// Whether frames of this type carry a method name.
    pub fn has_method(self) -> bool {
        matches!(self, Self::Emit | Self::AckRequest)
    }
}

impl TryFrom<u8> for MessageType {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Open),
            1 => Ok(Self::Close),
            2 => Ok(Self::Ping),
            3 => Ok(Self::Pong),
            4 => Ok(Self::Empty),
            5 => Ok(Self::Emit),
            6 => Ok(Self::AckRequest),
            7 => Ok(Self::AckResponse),
            _ => Err(ProtocolError::UnknownMessageType),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Close => write!(f, "close"),
            Self::Ping => write!(f, "ping"),
            Self::Pong => write!(f, "pong"),
            Self::Empty => write!(f, "empty"),
            Self::Emit => write!(f, "emit"),
            Self::AckRequest => write!(f, "ack_request"),
            Self::AckResponse => write!(f, "ack_response"),
        }
    }
}

/// One protocol frame.
///
/// `args` is absent, a single JSON value, or a JSON array whose elements are
/// the positional arguments. `ack_id` is only meaningful for ack frames and
/// `method` only for emit / ack-request frames.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    /// Frame type.
    pub kind: MessageType,
    /// Correlation id (ack frames only, `0` otherwise).
    pub ack_id: u64,
    /// Event name (emit / ack-request frames only).
    pub method: String,
    /// Argument payload.
    pub args: Option<Value>,
    /// Raw wire text this message was decoded from (empty for outbound frames).
    pub source: String,
}

impl Message {
    /// Create a message of the given type with no payload.
    pub fn new(kind: MessageType) -> Self {
        Self {
            kind,
            ack_id: 0,
            method: String::new(),
            args: None,
            source: String::new(),
        }
    }

    /// Open frame carrying the connection header.
    pub fn open(header: Value) -> Self {
        Self {
            args: Some(header),
            ..Self::new(MessageType::Open)
        }
    }

    /// Close frame.
    pub fn close() -> Self {
        Self::new(MessageType::Close)
    }

    /// Heartbeat ping.
    pub fn ping() -> Self {
        Self::new(MessageType::Ping)
    }

    /// Heartbeat pong.
    pub fn pong() -> Self {
        Self::new(MessageType::Pong)
    }

    /// Empty (namespace connect) frame.
    pub fn empty() -> Self {
        Self::new(MessageType::Empty)
    }

    /// One-way event.
    pub fn emit(method: impl Into<String>, args: Option<Value>) -> Self {
        Self {
            method: method.into(),
            args,
            ..Self::new(MessageType::Emit)
        }
    }

    /// Event expecting a response correlated by `ack_id`.
    pub fn ack_request(ack_id: u64, method: impl Into<String>, args: Option<Value>) -> Self {
        Self {
            ack_id,
            method: method.into(),
            args,
            ..Self::new(MessageType::AckRequest)
        }
    }

    /// Response to the request identified by `ack_id`.
    pub fn ack_response(ack_id: u64, args: Option<Value>) -> Self {
        Self {
            ack_id,
            args,
            ..Self::new(MessageType::AckResponse)
        }
    }

    /// Positional arguments as a slice.
    ///
    /// An array payload yields its elements, a single value yields a
    /// one-element slice, and an absent payload yields an empty slice.
    pub fn args_list(&self) -> &[Value] {
        match &self.args {
            Some(Value::Array(items)) => items,
            Some(other) => std::slice::from_ref(other),
            None => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_codes_round_trip() {
        for code in 0u8..=7 {
            let kind = MessageType::try_from(code).unwrap();
            assert_eq!(kind as u8, code);
        }
    }

    #[test]
    fn unknown_numeric_code_rejected() {
        assert!(matches!(
            MessageType::try_from(8),
            Err(ProtocolError::UnknownMessageType)
        ));
    }

    #[test]
    fn ack_and_method_flags() {
        assert!(MessageType::AckRequest.has_ack_id());
        assert!(MessageType::AckResponse.has_ack_id());
        assert!(!MessageType::Emit.has_ack_id());
        assert!(MessageType::Emit.has_method());
        assert!(!MessageType::AckResponse.has_method());
    }

    #[test]
    fn display_is_snake_case() {
        assert_eq!(MessageType::AckRequest.to_string(), "ack_request");
        assert_eq!(MessageType::Ping.to_string(), "ping");
    }

    #[test]
    fn constructors_fill_fields() {
        let msg = Message::ack_request(7, "join", Some(json!(["room"])));
        assert_eq!(msg.kind, MessageType::AckRequest);
        assert_eq!(msg.ack_id, 7);
        assert_eq!(msg.method, "join");
        assert!(msg.source.is_empty());

        let resp = Message::ack_response(7, None);
        assert_eq!(resp.kind, MessageType::AckResponse);
        assert!(resp.method.is_empty());
    }

    #[test]
    fn args_list_shapes() {
        assert!(Message::emit("a", None).args_list().is_empty());
        assert_eq!(Message::emit("a", Some(json!(5))).args_list(), &[json!(5)]);
        assert_eq!(
            Message::emit("a", Some(json!([1, "x"]))).args_list(),
            &[json!(1), json!("x")]
        );
    }
}
