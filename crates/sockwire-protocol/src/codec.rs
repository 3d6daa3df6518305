//! Wire text ⇄ [`Message`] translation.
//!
//! Grammar (prefix → meaning):
//!
//! | Prefix | Type |
//! |--------|------|
//! | `0` | Open, followed by a JSON header |
//! | `1` | Close |
//! | `2` | Ping |
//! | `3` | Pong |
//! | `40` | Empty |
//! | `42` | Emit (`42["method",...]`) or AckRequest (`42<id>["method",...]`) |
//! | `43` | AckResponse (`43<id>[...]`) |
//!
//! Both directions are pure functions: no I/O, no shared state.

use std::fmt::Write as _;

use serde::ser::{Serialize, SerializeSeq, Serializer};
use serde_json::Value;

use crate::errors::{ProtocolError, Result};
use crate::message::{Message, MessageType};

const OPEN: &str = "0";
const CLOSE: &str = "1";
const PING: &str = "2";
const PONG: &str = "3";
const EMPTY_MESSAGE: &str = "40";
const COMMON_MESSAGE: &str = "42";
const ACK_MESSAGE: &str = "43";

/// Shortest frame that can hold a two-character prefix, an id digit and `[`.
const MIN_ACK_FRAME_LEN: usize = 4;

/// Wire prefix for a message type.
pub fn prefix(kind: MessageType) -> &'static str {
    match kind {
        MessageType::Open => OPEN,
        MessageType::Close => CLOSE,
        MessageType::Ping => PING,
        MessageType::Pong => PONG,
        MessageType::Empty => EMPTY_MESSAGE,
        MessageType::Emit | MessageType::AckRequest => COMMON_MESSAGE,
        MessageType::AckResponse => ACK_MESSAGE,
    }
}

/// `["method", arg0, arg1, ...]` without cloning the arguments.
struct EventPayload<'a> {
    method: &'a str,
    args: &'a [Value],
}

impl Serialize for EventPayload<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.args.len() + 1))?;
        seq.serialize_element(self.method)?;
        for arg in self.args {
            seq.serialize_element(arg)?;
        }
        seq.end()
    }
}

/// Encode a message into wire text.
pub fn encode(msg: &Message) -> Result<String> {
    let mut out = String::from(prefix(msg.kind));

    match msg.kind {
        MessageType::Ping | MessageType::Pong | MessageType::Empty => {}
        MessageType::Open | MessageType::Close => {
            if let Some(args) = &msg.args {
                out.push_str(&serde_json::to_string(args)?);
            }
        }
        MessageType::AckResponse => {
            let _ = write!(out, "{}", msg.ack_id);
            if let Some(args) = &msg.args {
                out.push_str(&serde_json::to_string(args)?);
            }
        }
        MessageType::Emit | MessageType::AckRequest => {
            if msg.kind == MessageType::AckRequest {
                let _ = write!(out, "{}", msg.ack_id);
            }
            let payload = EventPayload {
                method: &msg.method,
                args: msg.args_list(),
            };
            out.push_str(&serde_json::to_string(&payload)?);
        }
    }

    Ok(out)
}

/// Prefix classification before ack-id extraction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FrameClass {
    Open,
    Close,
    Ping,
    Pong,
    Empty,
    Common,
    Ack,
}

fn classify(data: &str) -> Result<FrameClass> {
    let bytes = data.as_bytes();
    let Some(&first) = bytes.first() else {
        return Err(ProtocolError::UnknownMessageType);
    };
    match first {
        b'0' => Ok(FrameClass::Open),
        b'1' => Ok(FrameClass::Close),
        b'2' => Ok(FrameClass::Ping),
        b'3' => Ok(FrameClass::Pong),
        b'4' => match bytes.get(1) {
            Some(b'0') => Ok(FrameClass::Empty),
            Some(b'2') => Ok(FrameClass::Common),
            Some(b'3') => Ok(FrameClass::Ack),
            _ => Err(ProtocolError::UnknownMessageType),
        },
        _ => Err(ProtocolError::UnknownMessageType),
    }
}

/// Split `42<id>[...]` / `43<id>[...]` into the id and the `[...]` remainder.
///
/// The caller guarantees the first two bytes are an ASCII prefix.
fn split_ack_id(data: &str) -> Result<(u64, &str)> {
    if data.len() < MIN_ACK_FRAME_LEN {
        return Err(ProtocolError::MalformedPacket(format!(
            "frame too short for an ack id ({} bytes)",
            data.len()
        )));
    }
    let text = &data[2..];
    let pos = text
        .find('[')
        .ok_or_else(|| ProtocolError::MalformedPacket("missing '[' after ack id".into()))?;
    let digits = &text[..pos];
    let id = digits.parse::<u64>().map_err(|e| {
        ProtocolError::MalformedPacket(format!("invalid ack id {digits:?}: {e}"))
    })?;
    Ok((id, &text[pos..]))
}

fn parse_array(text: &str) -> Result<Vec<Value>> {
    serde_json::from_str::<Vec<Value>>(text)
        .map_err(|e| ProtocolError::PayloadDecode(format!("expected a JSON array: {e}")))
}

/// Decode wire text into a message.
///
/// A `42` frame whose ack id cannot be extracted is an Emit; one whose id
/// parses is an AckRequest. A bare `42` decodes as an Emit with an empty
/// method and no arguments.
pub fn decode(data: &str) -> Result<Message> {
    let class = classify(data)?;
    let kind = match class {
        FrameClass::Open => MessageType::Open,
        FrameClass::Close => MessageType::Close,
        FrameClass::Ping => MessageType::Ping,
        FrameClass::Pong => MessageType::Pong,
        FrameClass::Empty => MessageType::Empty,
        FrameClass::Common => MessageType::AckRequest,
        FrameClass::Ack => MessageType::AckResponse,
    };
    let mut msg = Message {
        source: data.to_owned(),
        ..Message::new(kind)
    };

    match class {
        FrameClass::Close | FrameClass::Ping | FrameClass::Pong | FrameClass::Empty => Ok(msg),
        FrameClass::Open => {
            msg.args = Some(Value::Array(parse_array(&data[1..])?));
            Ok(msg)
        }
        FrameClass::Ack => {
            let (id, rest) = split_ack_id(data)?;
            msg.ack_id = id;
            msg.args = Some(Value::Array(parse_array(rest)?));
            Ok(msg)
        }
        FrameClass::Common => {
            let rest = if let Ok((id, rest)) = split_ack_id(data) {
                msg.ack_id = id;
                rest
            } else {
                msg.kind = MessageType::Emit;
                &data[2..]
            };

            if msg.kind == MessageType::Emit && rest.is_empty() {
                msg.args = Some(Value::Array(Vec::new()));
                return Ok(msg);
            }

            let mut values = parse_array(rest)?.into_iter();
            match values.next() {
                Some(Value::String(method)) => msg.method = method,
                Some(other) => {
                    return Err(ProtocolError::PayloadDecode(format!(
                        "event name must be a string, got {other}"
                    )));
                }
                None => {
                    return Err(ProtocolError::PayloadDecode(
                        "event payload is an empty array".into(),
                    ));
                }
            }
            msg.args = Some(Value::Array(values.collect()));
            Ok(msg)
        }
    }
}
