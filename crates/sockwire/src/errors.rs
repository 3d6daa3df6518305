//! Error types for channels, handler binding and dispatch.

use std::time::Duration;

use sockwire_protocol::ProtocolError;
use sockwire_settings::SettingsError;
use thiserror::Error;

/// Errors raised while sending on a [`Channel`](crate::channel::Channel).
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The outbound frame could not be encoded.
    #[error(transparent)]
    Encode(#[from] ProtocolError),

    /// Serializing the arguments panicked; the panic was caught.
    #[error("argument serialization panicked: {0}")]
    EncodePanic(String),

    /// The outbound queue already holds `capacity` unsent frames.
    #[error("socket overflood: outbound queue full ({capacity} frames)")]
    SocketOverflood {
        /// Fixed queue capacity.
        capacity: usize,
    },

    /// The channel (or its transport) has been closed.
    #[error("channel closed")]
    Closed,

    /// No ack response arrived before the deadline.
    #[error("send timeout: no ack for {method:?} within {timeout:?}")]
    SendTimeout {
        /// Method of the unanswered request.
        method: String,
        /// How long the caller waited.
        timeout: Duration,
    },

    /// The waiter for `id` was dropped without a response (channel torn down).
    #[error("ack {id} abandoned before a response arrived")]
    AckAbandoned {
        /// Correlation id.
        id: u64,
    },
}

/// Errors raised when a handler is registered.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindError {
    /// The handler's first parameter is not the channel context.
    #[error("handler is not callable: {0}")]
    NotCallable(String),

    /// The handler declares no parameters at all.
    #[error("handler must accept the channel as its first parameter")]
    TooFewParameters,

    /// The handler declares more than one return value.
    #[error("handler declares {count} return values, at most one is allowed")]
    TooManyReturnValues {
        /// Number of declared return values.
        count: usize,
    },
}

/// Errors raised while dispatching decoded arguments to a handler.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A positional argument could not be converted to its declared type.
    #[error("argument {index} cannot be converted to {target}: {reason}")]
    Coercion {
        /// Zero-based payload parameter index.
        index: usize,
        /// Declared parameter type.
        target: &'static str,
        /// Underlying conversion failure.
        reason: String,
    },

    /// The handler's return value could not be represented as JSON.
    #[error("handler result is not representable as JSON: {0}")]
    Result(#[from] serde_json::Error),

    /// The handler panicked; the panic was caught.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

/// Message carried by a caught panic payload.
pub(crate) fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// Errors raised while processing one inbound frame.
#[derive(Debug, Error)]
pub enum InboundError {
    /// The frame could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The handler for `method` rejected its arguments.
    #[error("dispatch of {method:?} failed: {source}")]
    Dispatch {
        /// Method that was being dispatched.
        method: String,
        /// Underlying failure.
        #[source]
        source: DispatchError,
    },

    /// A reply (pong or ack response) could not be queued.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Errors raised while starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or inspecting the listener failed.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The settings handed to the server are inconsistent.
    #[error("invalid server settings: {0}")]
    Settings(#[from] SettingsError),
}
