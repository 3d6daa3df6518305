//! Method registry and inbound frame routing.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use serde_json::Value;
use sockwire_protocol::{Message, MessageType, decode};
use tracing::{debug, info, warn};

use crate::caller::{Caller, Handler};
use crate::channel::Channel;
use crate::errors::{BindError, DispatchError, InboundError};
use crate::metrics::{COERCION_FAILURES_TOTAL, FRAMES_IN_TOTAL};

/// Event invoked once a connection is open.
pub const ON_CONNECTION: &str = "connection";
/// Event invoked once a connection has gone away.
pub const ON_DISCONNECTION: &str = "disconnection";

/// What the transport should do after a frame was processed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading.
    Continue,
    /// The peer asked to close the connection.
    Close,
}

/// Registry mapping event names to bound handlers.
#[derive(Clone, Debug, Default)]
pub struct MethodRegistry {
    handlers: HashMap<String, Arc<Caller>>,
}

impl MethodRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` and register it under `method`, replacing any
    /// previous handler with that name.
    pub fn on<H, Args>(&mut self, method: &str, handler: H) -> Result<(), BindError>
    where
        H: Handler<Args>,
    {
        let caller = Caller::bind(handler)?;
        let _ = self.handlers.insert(method.to_owned(), Arc::new(caller));
        Ok(())
    }

    /// Look up the binding for `method`.
    pub fn get(&self, method: &str) -> Option<&Arc<Caller>> {
        self.handlers.get(method)
    }

    /// List all registered method names (sorted).
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check whether a method is registered.
    pub fn has_method(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Decode one inbound text frame and act on it.
    ///
    /// Frames are expected one at a time per channel. Ack responses are
    /// delivered to their waiter, events are dispatched, and ack requests
    /// are answered with the handler's result.
    pub fn process(&self, channel: &Channel, text: &str) -> Result<Flow, InboundError> {
        counter!(FRAMES_IN_TOTAL).increment(1);
        let msg = decode(text)?;
        channel.mark_alive();

        match msg.kind {
            MessageType::Ping => {
                channel.send_message(&Message::pong())?;
            }
            MessageType::Pong | MessageType::Open | MessageType::Empty => {}
            MessageType::Close => {
                debug!(channel_id = %channel.id(), "peer requested close");
                return Ok(Flow::Close);
            }
            MessageType::AckResponse => {
                let args = msg.args.unwrap_or_else(|| Value::Array(Vec::new()));
                let _ = channel.acks().fulfill(msg.ack_id, args);
            }
            MessageType::Emit => {
                let _ = self.dispatch(channel, &msg)?;
            }
            MessageType::AckRequest => {
                if let Some(result) = self.dispatch(channel, &msg)? {
                    let args = match result {
                        Some(value) => vec![value],
                        None => Vec::new(),
                    };
                    let reply = Message::ack_response(msg.ack_id, Some(Value::Array(args)));
                    channel.send_message(&reply)?;
                }
            }
        }
        Ok(Flow::Continue)
    }

    /// Invoke the handler for an event message.
    ///
    /// `Ok(None)` means no handler is registered; `Ok(Some(result))`
    /// carries the handler's optional return value.
    fn dispatch(
        &self,
        channel: &Channel,
        msg: &Message,
    ) -> Result<Option<Option<Value>>, InboundError> {
        let Some(caller) = self.handlers.get(&msg.method) else {
            debug!(channel_id = %channel.id(), method = %msg.method, "no handler registered, ignoring");
            return Ok(None);
        };
        match caller.dispatch(channel, msg.args_list()) {
            Ok(result) => Ok(Some(result)),
            Err(source) => {
                if matches!(source, DispatchError::Coercion { .. }) {
                    counter!(COERCION_FAILURES_TOTAL).increment(1);
                }
                warn!(channel_id = %channel.id(), method = %msg.method, error = %source, "dispatch failed");
                Err(InboundError::Dispatch {
                    method: msg.method.clone(),
                    source,
                })
            }
        }
    }

    /// Run the connection handler, if registered.
    pub fn connect(&self, channel: &Channel) {
        info!(channel_id = %channel.id(), "channel connected");
        self.lifecycle(ON_CONNECTION, channel);
    }

    /// Run the disconnection handler, if registered.
    pub fn disconnect(&self, channel: &Channel) {
        info!(channel_id = %channel.id(), "channel disconnected");
        self.lifecycle(ON_DISCONNECTION, channel);
    }

    fn lifecycle(&self, event: &str, channel: &Channel) {
        let Some(caller) = self.handlers.get(event) else {
            return;
        };
        if let Err(error) = caller.dispatch(channel, &[]) {
            warn!(channel_id = %channel.id(), event, %error, "lifecycle handler failed");
        }
    }
}
