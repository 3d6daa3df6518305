//! Emit and ack orchestration on top of the queue and the registry.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use metrics::{counter, histogram};
use serde::Serialize;
use serde_json::Value;
use sockwire_protocol::{Message, ProtocolError, encode};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use super::Channel;
use crate::errors::{ChannelError, panic_reason};
use crate::metrics::{ACK_LATENCY_SECONDS, ACK_TIMEOUTS_TOTAL, FRAMES_OUT_TOTAL};

/// Serialize outbound arguments, converting a panicking `Serialize` impl
/// into [`ChannelError::EncodePanic`].
///
/// `()` and other values serializing to `null` mean "no arguments".
fn encode_args<T: Serialize + ?Sized>(args: &T) -> Result<Option<Value>, ChannelError> {
    match catch_unwind(AssertUnwindSafe(|| serde_json::to_value(args))) {
        Ok(Ok(Value::Null)) => Ok(None),
        Ok(Ok(value)) => Ok(Some(value)),
        Ok(Err(e)) => Err(ChannelError::Encode(ProtocolError::Encoding(e))),
        Err(payload) => Err(ChannelError::EncodePanic(panic_reason(payload.as_ref()))),
    }
}

impl Channel {
    /// Encode `msg` and append it to the outbound queue.
    pub fn send_message(&self, msg: &Message) -> Result<(), ChannelError> {
        self.push_frame(encode(msg)?)
    }

    /// Append already-encoded wire text to the outbound queue.
    pub(super) fn push_frame(&self, frame: String) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        self.outbound().try_push(frame)?;
        counter!(FRAMES_OUT_TOTAL).increment(1);
        Ok(())
    }

    /// Send a one-way event.
    ///
    /// An array value is spread into positional arguments; any other value
    /// becomes the single argument. A value serializing to `null` (`()`,
    /// `None`, `Value::Null`) sends no arguments at all, so `42["x"]` rather
    /// than `42["x",null]`; pass `&[Value::Null]` for an explicit null.
    /// Encode and overflow failures are returned. A panic while serializing
    /// `args` is logged and swallowed.
    pub fn emit<T: Serialize + ?Sized>(&self, method: &str, args: &T) -> Result<(), ChannelError> {
        let args = match encode_args(args) {
            Ok(args) => args,
            Err(ChannelError::EncodePanic(reason)) => {
                error!(channel_id = %self.id(), method, %reason, "emit argument serialization panicked");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        self.send_message(&Message::emit(method, args))
    }

    /// Send an event and wait up to `timeout` for the peer's response.
    ///
    /// Returns the response arguments (a JSON array). The waiter is
    /// registered before the request is queued and removed again if
    /// queueing fails or the deadline passes.
    pub async fn ack<T: Serialize + ?Sized>(
        &self,
        method: &str,
        args: &T,
        timeout: Duration,
    ) -> Result<Value, ChannelError> {
        let acks = self.acks();
        let id = acks.next_id();
        let waiter = acks.register(id);

        let sent = encode_args(args)
            .and_then(|args| self.send_message(&Message::ack_request(id, method, args)));
        if let Err(e) = sent {
            let _ = acks.remove(id);
            return Err(e);
        }

        let started = Instant::now();
        match tokio::time::timeout(timeout, waiter.recv()).await {
            Ok(Some(value)) => {
                histogram!(ACK_LATENCY_SECONDS).record(started.elapsed().as_secs_f64());
                debug!(channel_id = %self.id(), ack_id = id, method, "ack fulfilled");
                Ok(value)
            }
            Ok(None) => Err(ChannelError::AckAbandoned { id }),
            Err(_) => {
                let _ = acks.remove(id);
                counter!(ACK_TIMEOUTS_TOTAL).increment(1);
                warn!(channel_id = %self.id(), ack_id = id, method, ?timeout, "ack timed out");
                Err(ChannelError::SendTimeout {
                    method: method.to_string(),
                    timeout,
                })
            }
        }
    }

    /// [`Self::ack`] with the channel's configured ack timeout.
    pub async fn request<T: Serialize + ?Sized>(
        &self,
        method: &str,
        args: &T,
    ) -> Result<Value, ChannelError> {
        self.ack(method, args, self.ack_timeout()).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashSet};

    use assert_matches::assert_matches;
    use serde::Serializer;
    use serde_json::json;
    use tracing::Level;

    use super::*;
    use crate::logging::test_utils::capture_logs;

    struct Exploding;

    impl Serialize for Exploding {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            panic!("cyclic argument graph");
        }
    }

    struct BadKeys;

    impl Serialize for BadKeys {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut map = BTreeMap::new();
            let _ = map.insert(vec![1u8], 1);
            map.serialize(serializer)
        }
    }

    #[test]
    fn emit_spreads_array_args() {
        let (channel, mut rx) = Channel::new("c", 8);
        channel.emit("move", &json!([1, 2])).unwrap();
        channel.emit("say", "hi").unwrap();
        channel.emit("ping", &()).unwrap();
        assert_eq!(rx.try_recv().as_deref(), Some(r#"42["move",1,2]"#));
        assert_eq!(rx.try_recv().as_deref(), Some(r#"42["say","hi"]"#));
        assert_eq!(rx.try_recv().as_deref(), Some(r#"42["ping"]"#));
    }

    #[test]
    fn emit_null_sends_no_arguments() {
        let (channel, mut rx) = Channel::new("c", 8);
        channel.emit("x", &Value::Null).unwrap();
        channel.emit("x", &[Value::Null]).unwrap();
        assert_eq!(rx.try_recv().as_deref(), Some(r#"42["x"]"#));
        assert_eq!(rx.try_recv().as_deref(), Some(r#"42["x",null]"#));
    }

    #[test]
    fn emit_reports_overflow() {
        let (channel, mut rx) = Channel::new("c", 1);
        channel.emit("a", &()).unwrap();
        let err = channel.emit("b", &()).unwrap_err();
        assert_matches!(err, ChannelError::SocketOverflood { capacity: 1 });
        assert_eq!(rx.try_recv().as_deref(), Some(r#"42["a"]"#));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn emit_reports_encode_error() {
        let (channel, _rx) = Channel::new("c", 8);
        let err = channel.emit("bad", &BadKeys).unwrap_err();
        assert_matches!(err, ChannelError::Encode(ProtocolError::Encoding(_)));
    }

    #[test]
    fn emit_swallows_and_logs_serialization_panic() {
        let (logs, _guard) = capture_logs();
        let (channel, mut rx) = Channel::new("c", 8);
        assert!(channel.emit("boom", &Exploding).is_ok());
        assert!(logs.has_event(Level::ERROR, "emit argument serialization panicked"));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn emit_on_closed_channel_fails() {
        let (channel, _rx) = Channel::new("c", 8);
        channel.close();
        assert_matches!(channel.emit("x", &()), Err(ChannelError::Closed));
    }

    #[tokio::test]
    async fn ack_returns_fulfilled_value() {
        let (channel, mut rx) = Channel::new("c", 8);
        let peer = channel.clone();
        let task = tokio::spawn(async move {
            channel
                .ack("sum", &json!([1, 2]), Duration::from_secs(5))
                .await
        });

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame, r#"421["sum",1,2]"#);
        assert!(peer.acks().fulfill(1, json!([3])));

        let value = task.await.unwrap().unwrap();
        assert_eq!(value, json!([3]));
        assert!(peer.acks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn ack_timeout_leaves_no_waiter() {
        let (channel, _rx) = Channel::new("c", 8);
        let err = channel
            .ack("slow", &(), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert_matches!(err, ChannelError::SendTimeout { ref method, .. } if method == "slow");
        assert!(channel.acks().is_empty());
        assert!(!channel.acks().fulfill(1, json!(["late"])));
    }

    #[tokio::test(start_paused = true)]
    async fn request_uses_configured_timeout() {
        let (channel, _rx) = Channel::with_ack_timeout("c", 8, Duration::from_millis(250));
        let err = channel.request("slow", &()).await.unwrap_err();
        assert_matches!(
            err,
            ChannelError::SendTimeout { timeout, .. } if timeout == Duration::from_millis(250)
        );
    }

    #[tokio::test]
    async fn ack_send_failure_removes_waiter() {
        let (channel, _rx) = Channel::new("c", 1);
        channel.emit("fill", &()).unwrap();
        let err = channel
            .ack("x", &(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_matches!(err, ChannelError::SocketOverflood { .. });
        assert!(channel.acks().is_empty());
    }

    #[tokio::test]
    async fn ack_serialization_panic_is_returned() {
        let (channel, _rx) = Channel::new("c", 8);
        let err = channel
            .ack("x", &Exploding, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_matches!(err, ChannelError::EncodePanic(ref r) if r.contains("cyclic"));
        assert!(channel.acks().is_empty());
    }

    #[tokio::test]
    async fn ack_abandoned_on_close() {
        let (channel, mut rx) = Channel::new("c", 8);
        let closer = channel.clone();
        let task =
            tokio::spawn(async move { channel.ack("x", &(), Duration::from_secs(30)).await });
        let _ = rx.recv().await;
        closer.close();
        assert_matches!(
            task.await.unwrap(),
            Err(ChannelError::AckAbandoned { id: 1 })
        );
    }

    #[tokio::test]
    async fn concurrent_acks_get_distinct_ids() {
        let (channel, mut rx) = Channel::new("c", 8);
        let a = channel.clone();
        let b = channel.clone();
        let t1 = tokio::spawn(async move { a.ack("a", &(), Duration::from_secs(5)).await });
        let t2 = tokio::spawn(async move { b.ack("b", &(), Duration::from_secs(5)).await });

        let mut ids = HashSet::new();
        for _ in 0..2 {
            let frame = rx.recv().await.unwrap();
            let msg = sockwire_protocol::decode(&frame).unwrap();
            assert!(ids.insert(msg.ack_id));
            assert!(channel.acks().fulfill(msg.ack_id, json!([msg.method])));
        }
        assert_eq!(t1.await.unwrap().unwrap(), json!(["a"]));
        assert_eq!(t2.await.unwrap().unwrap(), json!(["b"]));
    }
}
