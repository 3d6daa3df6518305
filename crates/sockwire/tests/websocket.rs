//! End-to-end tests: a real server, a real WebSocket client.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use sockwire::{Channel, MethodRegistry, ON_CONNECTION, SocketServer, SockwireSettings};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn start(registry: MethodRegistry) -> (SocketServer, String) {
    start_with(SockwireSettings::default(), registry).await
}

async fn start_with(settings: SockwireSettings, registry: MethodRegistry) -> (SocketServer, String) {
    let server = SocketServer::new(settings, registry).unwrap();
    let (addr, _handle) = server.listen().await.unwrap();
    let url = format!("ws://{addr}/socket.io/?EIO=3&transport=websocket");
    (server, url)
}

/// Next text frame, skipping control frames.
async fn next_text(ws: &mut Client) -> Option<String> {
    loop {
        let frame = tokio::time::timeout(WAIT, ws.next()).await.unwrap()?;
        match frame.ok()? {
            Message::Text(text) => return Some(text.to_string()),
            Message::Close(_) => return None,
            _ => {}
        }
    }
}

/// Connect and consume the handshake, returning the session id.
async fn connect(url: &str) -> (Client, String) {
    let (mut ws, _) = connect_async(url).await.unwrap();
    let open = next_text(&mut ws).await.unwrap();
    assert!(open.starts_with('0'), "expected open frame, got {open}");
    let handshake: Value = serde_json::from_str(&open[1..]).unwrap();
    let sid = handshake["sid"].as_str().unwrap().to_owned();
    assert_eq!(next_text(&mut ws).await.as_deref(), Some("40"));
    (ws, sid)
}

async fn wait_for_count(server: &SocketServer, expected: usize) {
    tokio::time::timeout(WAIT, async {
        while server.channels().count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn handshake_announces_session() {
    let (server, url) = start(MethodRegistry::new()).await;
    let (mut ws, _) = connect_async(&url).await.unwrap();

    let open = next_text(&mut ws).await.unwrap();
    let handshake: Value = serde_json::from_str(open.strip_prefix('0').unwrap()).unwrap();
    assert_eq!(handshake["pingInterval"], 30_000);
    assert_eq!(handshake["pingTimeout"], 60_000);
    assert_eq!(handshake["upgrades"], json!([]));

    let sid = handshake["sid"].as_str().unwrap();
    assert!(server.channels().get(sid).is_some());
    assert_eq!(next_text(&mut ws).await.as_deref(), Some("40"));
}

#[tokio::test]
async fn ping_is_answered() {
    let (_server, url) = start(MethodRegistry::new()).await;
    let (mut ws, _) = connect(&url).await;

    ws.send(Message::text("2")).await.unwrap();
    assert_eq!(next_text(&mut ws).await.as_deref(), Some("3"));
}

#[tokio::test]
async fn ack_request_gets_handler_result() {
    let mut registry = MethodRegistry::new();
    registry
        .on("sum", |_ch: &Channel, a: i64, b: i64| a + b)
        .unwrap();
    let (_server, url) = start(registry).await;
    let (mut ws, _) = connect(&url).await;

    ws.send(Message::text(r#"421["sum",1,2]"#)).await.unwrap();
    assert_eq!(next_text(&mut ws).await.as_deref(), Some("431[3]"));

    // Float payloads narrow toward the declared integer type.
    ws.send(Message::text(r#"422["sum",1.9,2]"#)).await.unwrap();
    assert_eq!(next_text(&mut ws).await.as_deref(), Some("432[3]"));
}

#[tokio::test]
async fn bad_frames_do_not_end_session() {
    let mut registry = MethodRegistry::new();
    registry.on("n", |_ch: &Channel, n: u8| n).unwrap();
    let (_server, url) = start(registry).await;
    let (mut ws, _) = connect(&url).await;

    ws.send(Message::text("9garbage")).await.unwrap();
    ws.send(Message::text(r#"421["n","not a number"]"#))
        .await
        .unwrap();
    ws.send(Message::text("2")).await.unwrap();
    assert_eq!(next_text(&mut ws).await.as_deref(), Some("3"));
}

#[tokio::test]
async fn connection_handler_can_emit() {
    let mut registry = MethodRegistry::new();
    registry
        .on(ON_CONNECTION, |ch: &Channel| {
            ch.emit("welcome", ch.id()).unwrap();
        })
        .unwrap();
    let (_server, url) = start(registry).await;
    let (mut ws, sid) = connect(&url).await;

    let expected = format!(r#"42["welcome","{sid}"]"#);
    assert_eq!(next_text(&mut ws).await, Some(expected));
}

#[tokio::test]
async fn server_ack_round_trip() {
    let (server, url) = start(MethodRegistry::new()).await;
    let (mut ws, sid) = connect(&url).await;

    let channel = server.channels().get(&sid).unwrap();
    let pending =
        tokio::spawn(async move { channel.ack("ask", &["question"], Duration::from_secs(5)).await });

    assert_eq!(
        next_text(&mut ws).await.as_deref(),
        Some(r#"421["ask","question"]"#)
    );
    ws.send(Message::text(r#"431["answer",42]"#)).await.unwrap();

    let value = pending.await.unwrap().unwrap();
    assert_eq!(value, json!(["answer", 42]));
}

#[tokio::test]
async fn broadcast_reaches_all_channels() {
    let (server, url) = start(MethodRegistry::new()).await;
    let (mut a, _) = connect(&url).await;
    let (mut b, _) = connect(&url).await;
    wait_for_count(&server, 2).await;

    assert_eq!(server.channels().emit_all("news", &["hello", "world"]), 2);
    let expected = r#"42["news","hello","world"]"#;
    assert_eq!(next_text(&mut a).await.as_deref(), Some(expected));
    assert_eq!(next_text(&mut b).await.as_deref(), Some(expected));
}

#[tokio::test]
async fn client_close_removes_channel() {
    let (server, url) = start(MethodRegistry::new()).await;
    let (mut ws, _) = connect(&url).await;
    wait_for_count(&server, 1).await;

    ws.send(Message::text("1")).await.unwrap();
    wait_for_count(&server, 0).await;
}

#[tokio::test]
async fn shutdown_closes_clients() {
    let (server, url) = start(MethodRegistry::new()).await;
    let (mut ws, _) = connect(&url).await;
    wait_for_count(&server, 1).await;

    server.shutdown();
    assert_eq!(next_text(&mut ws).await, None);
    wait_for_count(&server, 0).await;
}

#[tokio::test]
async fn silent_client_dropped_after_ping_timeout() {
    let mut settings = SockwireSettings::default();
    settings.channel.ping_interval_ms = 50;
    settings.channel.ping_timeout_ms = 200;
    let (server, url) = start_with(settings, MethodRegistry::new()).await;
    let (mut ws, _) = connect(&url).await;
    wait_for_count(&server, 1).await;

    // Not polling the client means its automatic Pong replies are never sent.
    wait_for_count(&server, 0).await;
    assert_eq!(next_text(&mut ws).await, None);
}
