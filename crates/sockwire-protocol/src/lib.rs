//! # sockwire-protocol
//!
//! Text framing shared by engine.io transports and socket.io-style events.
//!
//! - [`Message`] / [`MessageType`]: one frame in memory
//! - [`encode`] / [`decode`]: pure translation to and from wire text
//! - [`ProtocolError`]: everything that can go wrong on either side
//!
//! Binary attachments and namespaces other than the default one are not
//! represented.

#![deny(unsafe_code)]

pub mod codec;
pub mod errors;
pub mod message;

pub use codec::{decode, encode};
pub use errors::{ProtocolError, Result};
pub use message::{Message, MessageType};
