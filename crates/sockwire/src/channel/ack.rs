//! Correlation of ack requests with their responses.
//!
//! Each outstanding request owns one single-use [`oneshot`] slot keyed by
//! its correlation id. A slot leaves the map exactly once: when fulfilled,
//! when its caller times out, or when the send that created it fails.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

/// Per-connection table of in-flight ack requests.
#[derive(Debug)]
pub struct AckRegistry {
    next_id: AtomicU64,
    waiters: Mutex<HashMap<u64, oneshot::Sender<Value>>>,
}

impl AckRegistry {
    /// Create an empty registry. The first id handed out is `1`.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            waiters: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate a correlation id, unique for the lifetime of this registry.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Create the waiter for `id`. Must happen before the request is sent.
    ///
    /// Registering an id twice replaces the earlier waiter, which then
    /// observes abandonment.
    pub fn register(&self, id: u64) -> AckWaiter {
        let (tx, rx) = oneshot::channel();
        let _ = self.waiters.lock().insert(id, tx);
        AckWaiter { id, rx }
    }

    /// Deliver `value` to the waiter for `id`.
    ///
    /// Returns `false` (and does nothing else) when no waiter is registered,
    /// e.g. the request already timed out or was answered.
    pub fn fulfill(&self, id: u64, value: Value) -> bool {
        let Some(tx) = self.waiters.lock().remove(&id) else {
            debug!(ack_id = id, "ack response for unknown id, ignoring");
            return false;
        };
        tx.send(value).is_ok()
    }

    /// Unregister `id` unconditionally. Returns whether a waiter was present.
    pub fn remove(&self, id: u64) -> bool {
        self.waiters.lock().remove(&id).is_some()
    }

    /// Number of outstanding waiters.
    pub fn len(&self) -> usize {
        self.waiters.lock().len()
    }

    /// Whether no request is outstanding.
    pub fn is_empty(&self) -> bool {
        self.waiters.lock().is_empty()
    }

    /// Drop every waiter; their callers observe abandonment.
    pub fn clear(&self) {
        self.waiters.lock().clear();
    }
}

impl Default for AckRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half of one registered ack slot.
#[derive(Debug)]
pub struct AckWaiter {
    id: u64,
    rx: oneshot::Receiver<Value>,
}

impl AckWaiter {
    /// Correlation id of this waiter.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the response. `None` if the slot was dropped unanswered.
    pub async fn recv(self) -> Option<Value> {
        self.rx.await.ok()
    }
}
