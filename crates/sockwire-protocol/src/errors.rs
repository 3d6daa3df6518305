//! Protocol error types.

use thiserror::Error;

/// Errors raised while encoding or decoding a frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame prefix (or numeric type code) does not name a known message type.
    #[error("unknown message type")]
    UnknownMessageType,

    /// The frame is too short or its ack id could not be extracted.
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// The JSON payload is invalid or has the wrong shape.
    #[error("payload decode error: {0}")]
    PayloadDecode(String),

    /// A value could not be represented as JSON.
    #[error("encoding failure: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
