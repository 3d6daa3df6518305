//! WebSocket session lifecycle: one connected peer from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::gauge;
use sockwire_settings::ChannelSettings;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::table::ChannelTable;
use crate::channel::{Channel, Handshake};
use crate::metrics::CHANNELS_ACTIVE;
use crate::registry::{Flow, MethodRegistry};

/// How long the forwarder may take to flush after the session ends.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Floor for the heartbeat period; `tokio::time::interval` rejects zero.
const MIN_PING_INTERVAL: Duration = Duration::from_millis(1);

/// Shared dependencies of every session.
#[derive(Clone)]
pub struct SessionContext {
    /// Event handlers.
    pub registry: Arc<MethodRegistry>,
    /// Live channels.
    pub channels: Arc<ChannelTable>,
    /// Per-channel settings.
    pub settings: ChannelSettings,
    /// Server-wide shutdown signal.
    pub shutdown: CancellationToken,
}

/// Run a session for a connected peer.
///
/// 1. Creates the channel and queues the Open / connect frames
/// 2. Runs the `connection` handler
/// 3. Forwards queued frames to the socket, with periodic Ping frames
/// 4. Processes inbound text frames in order
/// 5. Ends on a Close frame, idle timeout, channel close or shutdown,
///    then runs the `disconnection` handler
#[instrument(skip_all, fields(channel_id = %channel_id))]
pub async fn run_ws_session(ws: WebSocket, channel_id: String, ctx: SessionContext) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let settings = ctx.settings;

    let (channel, mut outbound_rx) = Channel::with_ack_timeout(
        channel_id.clone(),
        settings.queue_capacity,
        settings.ack_timeout(),
    );
    ctx.channels.insert(channel.clone());
    gauge!(CHANNELS_ACTIVE).increment(1.0);

    let handshake = Handshake::new(
        channel_id.clone(),
        settings.ping_interval(),
        settings.ping_timeout(),
    );
    if let Err(e) = channel.open(&handshake) {
        warn!(error = %e, "failed to queue handshake");
    }
    ctx.registry.connect(&channel);

    // Outbound forwarder with periodic Ping frames.
    let outbound_channel = channel.clone();
    let ping_every = settings.ping_interval().max(MIN_PING_INTERVAL);
    let outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(ping_every);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                frame = outbound_rx.recv() => {
                    let Some(text) = frame else { break };
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
                () = outbound_channel.closed() => {
                    while let Some(text) = outbound_rx.try_recv() {
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let ping_timeout = settings.ping_timeout();
    let mut idle_check = tokio::time::interval(ping_every);
    let _ = idle_check.tick().await;

    loop {
        tokio::select! {
            frame = ws_rx.next() => {
                let Some(Ok(frame)) = frame else { break };
                let text = match frame {
                    Message::Text(t) => t.to_string(),
                    Message::Binary(data) => {
                        if let Ok(s) = std::str::from_utf8(&data) {
                            s.to_owned()
                        } else {
                            debug!(len = data.len(), "ignoring non-UTF8 binary frame");
                            continue;
                        }
                    }
                    Message::Close(_) => {
                        info!("peer sent close frame");
                        break;
                    }
                    Message::Ping(_) | Message::Pong(_) => {
                        channel.mark_alive();
                        continue;
                    }
                };
                match ctx.registry.process(&channel, &text) {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Close) => break,
                    Err(e) => warn!(error = %e, "rejected inbound frame"),
                }
            }
            _ = idle_check.tick() => {
                if channel.idle_for() > ping_timeout {
                    warn!(?ping_timeout, "peer unresponsive, disconnecting");
                    break;
                }
            }
            () = channel.closed() => break,
            () = ctx.shutdown.cancelled() => break,
        }
    }

    channel.close();
    ctx.registry.disconnect(&channel);
    let _ = ctx.channels.remove(&channel_id);
    gauge!(CHANNELS_ACTIVE).decrement(1.0);
    let forwarder = outbound.abort_handle();
    if tokio::time::timeout(FLUSH_TIMEOUT, outbound).await.is_err() {
        debug!("outbound forwarder did not finish in time");
        forwarder.abort();
    }
}
