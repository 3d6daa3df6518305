//! Bounded queue of encoded frames awaiting the transport writer.

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::errors::ChannelError;
use crate::metrics::OVERFLOW_TOTAL;

/// Producer side of a connection's outbound queue.
///
/// Pushes never wait: a full queue rejects the frame immediately.
#[derive(Debug)]
pub struct OutboundQueue {
    tx: mpsc::Sender<String>,
    capacity: usize,
    /// Count of frames rejected because the queue was full.
    dropped: AtomicU64,
}

/// Consumer side of an [`OutboundQueue`], drained by the transport writer.
#[derive(Debug)]
pub struct OutboundReceiver {
    rx: mpsc::Receiver<String>,
}

impl OutboundQueue {
    /// Create a queue holding at most `capacity` frames (minimum 1).
    pub fn new(capacity: usize) -> (Self, OutboundReceiver) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let queue = Self {
            tx,
            capacity,
            dropped: AtomicU64::new(0),
        };
        (queue, OutboundReceiver { rx })
    }

    /// Append one frame, or fail at once if the queue is full or closed.
    pub fn try_push(&self, frame: String) -> Result<(), ChannelError> {
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
                counter!(OVERFLOW_TOTAL).increment(1);
                Err(ChannelError::SocketOverflood {
                    capacity: self.capacity,
                })
            }
            Err(TrySendError::Closed(_)) => Err(ChannelError::Closed),
        }
    }

    /// Fixed capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames currently waiting to be written.
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total frames rejected for overflow.
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl OutboundReceiver {
    /// Next frame, or `None` once every producer is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Next frame if one is ready.
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    /// Stop accepting new frames; queued frames can still be drained.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn push_then_recv_in_order() {
        let (queue, mut rx) = OutboundQueue::new(4);
        queue.try_push("2".into()).unwrap();
        queue.try_push("3".into()).unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(rx.recv().await.as_deref(), Some("2"));
        assert_eq!(rx.recv().await.as_deref(), Some("3"));
        assert!(queue.is_empty());
    }

    #[test]
    fn overflow_rejects_without_changing_contents() {
        let (queue, mut rx) = OutboundQueue::new(2);
        queue.try_push("a".into()).unwrap();
        queue.try_push("b".into()).unwrap();

        let err = queue.try_push("c".into()).unwrap_err();
        assert_matches!(err, ChannelError::SocketOverflood { capacity: 2 });
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.drop_count(), 1);

        assert_eq!(rx.try_recv().as_deref(), Some("a"));
        assert_eq!(rx.try_recv().as_deref(), Some("b"));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn room_frees_after_drain() {
        let (queue, mut rx) = OutboundQueue::new(1);
        queue.try_push("a".into()).unwrap();
        assert!(queue.try_push("b".into()).is_err());
        let _ = rx.try_recv();
        queue.try_push("b".into()).unwrap();
    }

    #[test]
    fn push_after_receiver_dropped_is_closed() {
        let (queue, rx) = OutboundQueue::new(1);
        drop(rx);
        assert_matches!(queue.try_push("a".into()), Err(ChannelError::Closed));
        assert_eq!(queue.drop_count(), 0);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let (queue, _rx) = OutboundQueue::new(0);
        assert_eq!(queue.capacity(), 1);
    }
}
