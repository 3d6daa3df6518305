//! Per-connection channel: outbound queue, ack registry and liveness.
//!
//! A [`Channel`] is a cheap-clone handle. Every clone shares the same
//! queue, registry and close token, so handlers can keep one around and
//! emit from any task.

pub mod ack;
pub mod outbound;
mod send;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use sockwire_protocol::codec::prefix;
use sockwire_protocol::{Message, MessageType, ProtocolError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use ack::{AckRegistry, AckWaiter};
pub use outbound::{OutboundQueue, OutboundReceiver};

use crate::errors::ChannelError;

const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection options announced in the Open frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Session id (the channel id).
    pub sid: String,
    /// Transport upgrades on offer (always empty for a WebSocket transport).
    pub upgrades: Vec<String>,
    /// Heartbeat interval in milliseconds.
    pub ping_interval: u64,
    /// Heartbeat timeout in milliseconds.
    pub ping_timeout: u64,
}

impl Handshake {
    /// Handshake for `sid` with the given heartbeat timings.
    pub fn new(sid: impl Into<String>, ping_interval: Duration, ping_timeout: Duration) -> Self {
        Self {
            sid: sid.into(),
            upgrades: Vec::new(),
            ping_interval: ping_interval.as_millis() as u64,
            ping_timeout: ping_timeout.as_millis() as u64,
        }
    }
}

struct Inner {
    id: String,
    outbound: OutboundQueue,
    acks: AckRegistry,
    last_seen: Mutex<Instant>,
    closed: CancellationToken,
    ack_timeout: Duration,
}

/// Handle to one live connection.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.inner.id)
            .field("queued", &self.inner.outbound.len())
            .field("pending_acks", &self.inner.acks.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Channel {
    /// Create a channel whose outbound queue holds `capacity` frames.
    ///
    /// The returned receiver is drained by whoever owns the transport.
    pub fn new(id: impl Into<String>, capacity: usize) -> (Self, OutboundReceiver) {
        Self::with_ack_timeout(id, capacity, DEFAULT_ACK_TIMEOUT)
    }

    /// Like [`Self::new`], with the wait used by [`Self::request`].
    pub fn with_ack_timeout(
        id: impl Into<String>,
        capacity: usize,
        ack_timeout: Duration,
    ) -> (Self, OutboundReceiver) {
        let (outbound, rx) = OutboundQueue::new(capacity);
        let channel = Self {
            inner: Arc::new(Inner {
                id: id.into(),
                outbound,
                acks: AckRegistry::new(),
                last_seen: Mutex::new(Instant::now()),
                closed: CancellationToken::new(),
                ack_timeout,
            }),
        };
        (channel, rx)
    }

    /// Channel id.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// The outbound queue.
    pub fn outbound(&self) -> &OutboundQueue {
        &self.inner.outbound
    }

    /// Default wait for ack responses.
    pub fn ack_timeout(&self) -> Duration {
        self.inner.ack_timeout
    }

    /// The ack registry.
    pub fn acks(&self) -> &AckRegistry {
        &self.inner.acks
    }

    /// Queue the Open frame followed by the namespace-connect frame.
    ///
    /// The header is written straight from [`Handshake`] so its fields keep
    /// their declared order on the wire.
    pub fn open(&self, handshake: &Handshake) -> Result<(), ChannelError> {
        let header = serde_json::to_string(handshake).map_err(ProtocolError::from)?;
        self.push_frame(format!("{}{header}", prefix(MessageType::Open)))?;
        self.send_message(&Message::empty())
    }

    /// Record inbound activity.
    pub fn mark_alive(&self) {
        *self.inner.last_seen.lock() = Instant::now();
    }

    /// Time since the last inbound activity (or creation).
    pub fn idle_for(&self) -> Duration {
        self.inner.last_seen.lock().elapsed()
    }

    /// Close the channel. Outstanding ack callers observe abandonment.
    ///
    /// Calling this more than once has no further effect.
    pub fn close(&self) {
        if self.inner.closed.is_cancelled() {
            return;
        }
        self.inner.closed.cancel();
        self.inner.acks.clear();
        debug!(channel_id = %self.inner.id, "channel closed");
    }

    /// Whether [`Self::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    /// Resolves once the channel is closed.
    pub async fn closed(&self) {
        self.inner.closed.cancelled().await;
    }
}
