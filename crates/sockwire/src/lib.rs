//! # sockwire
//!
//! Socket.io-style event channels over WebSocket.
//!
//! - [`channel`]: per-connection [`Channel`] with a bounded outbound queue
//!   and an ack correlation registry; `emit` and `ack` live here
//! - [`caller`]: binds plain functions as handlers and coerces decoded
//!   arguments into their parameter types
//! - [`registry`]: maps event names to handlers and routes inbound frames
//! - [`websocket`] / [`server`]: Axum transport, one session per connection
//! - [`logging`] / [`metrics`]: `tracing` subscriber setup and Prometheus names
//!
//! Wire framing lives in `sockwire-protocol`, configuration in
//! `sockwire-settings`.

#![deny(unsafe_code)]

pub mod caller;
pub mod channel;
pub mod errors;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod websocket;

pub use caller::{Caller, EventArg, Handler, Record};
pub use channel::{Channel, Handshake};
pub use errors::{BindError, ChannelError, DispatchError, InboundError, ServerError};
pub use registry::{Flow, MethodRegistry, ON_CONNECTION, ON_DISCONNECTION};
pub use server::SocketServer;
pub use sockwire_protocol::{Message, MessageType, ProtocolError};
pub use sockwire_settings::SockwireSettings;
