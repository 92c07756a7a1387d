use std::time::Duration;

use dglab_client::{Client, ClientConfig, ConnectionState, MessageType};
use futures_util::{SinkExt, Stream, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

fn text(value: Value) -> Message {
    Message::Text(value.to_string())
}

/// Next client message that is not a heartbeat, parsed as JSON.
async fn next_command<S>(ws: &mut S) -> Value
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = ws.next().await.expect("client hung up").expect("read");
        let Message::Text(raw) = msg else { continue };
        let value: Value = serde_json::from_str(&raw).expect("client sent JSON");
        if value["type"] != "heartbeat" {
            return value;
        }
    }
}

/// Serve one controller the way the relay does: assign an id, confirm the
/// bind, answer one strength command, then send a disconnect instruction.
async fn spawn_relay() -> (String, tokio::task::JoinHandle<Vec<Value>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let mut received = Vec::new();

        ws.send(text(json!({
            "type": "bind", "clientId": "C-1", "targetId": "", "message": "targetId"
        })))
        .await
        .unwrap();

        let bind = next_command(&mut ws).await;
        ws.send(text(json!({
            "type": "bind", "clientId": "C-1", "targetId": bind["targetId"], "message": "200"
        })))
        .await
        .unwrap();
        received.push(bind);

        let strength = next_command(&mut ws).await;
        ws.send(text(json!({
            "type": "msg", "clientId": "C-1", "targetId": "T-1",
            "message": "strength-50+0+200+200"
        })))
        .await
        .unwrap();
        received.push(strength);

        ws.send(text(json!({
            "type": "break", "clientId": "C-1", "targetId": "T-1", "message": "209"
        })))
        .await
        .unwrap();
        received
    });

    (format!("ws://{addr}"), server)
}

#[tokio::test]
async fn full_session_against_loopback_relay() {
    let (url, server) = spawn_relay().await;
    let client = Client::new(ClientConfig::default().with_ws_url(&url));

    let (events, mut rx) = mpsc::unbounded_channel();
    let tx = events.clone();
    client.set_on_bind(move |c, t| {
        let _ = tx.send(format!("bind {c} {t}"));
    });
    let tx = events.clone();
    client.set_on_message(move |env| {
        let _ = tx.send(format!("{} {}", env.msg_type, env.message));
    });

    client.connect().await.expect("handshake");
    assert_eq!(client.client_id().as_deref(), Some("C-1"));
    let host = url.trim_start_matches("ws://");
    assert_eq!(client.pairing_token(), Some(format!("{host}/C-1")));

    assert!(client.bind_target("T-1").await);
    let mut seen = Vec::new();
    while !seen.iter().any(|e: &String| e.starts_with("bind ")) {
        seen.push(tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap());
    }
    assert!(seen.contains(&"bind C-1 T-1".to_string()));
    assert_eq!(client.state(), ConnectionState::Ready { bound: true });

    assert!(client.send_strength(2, 1, 5).await);

    let mut tail = Vec::new();
    while !tail.iter().any(|e: &String| e.starts_with("break")) {
        tail.push(tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap());
    }
    assert!(tail.contains(&"msg strength-50+0+200+200".to_string()));
    assert!(!client.is_connected());
    assert_eq!(client.state(), ConnectionState::Disconnected);

    let received = server.await.unwrap();
    assert_eq!(
        received[0],
        json!({"type": "bind", "clientId": "C-1", "targetId": "T-1", "message": "DGLAB"})
    );
    assert_eq!(received[1]["type"], MessageType::Msg.as_str());
    assert_eq!(received[1]["message"], "strength-2+1+5");
    assert_eq!(received[1]["targetId"], "T-1");

    client.close().await;
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn connect_to_closed_port_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = Client::new(ClientConfig::default().with_ws_url(format!("ws://{addr}")));
    assert!(client.connect().await.is_err());
    assert!(!client.is_connected());
    assert_eq!(client.qr_content(), None);
}

#[tokio::test]
async fn server_that_never_assigns_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let client = Client::new(
        ClientConfig::default()
            .with_ws_url(format!("ws://{addr}"))
            .with_handshake_timeout(Duration::from_millis(200)),
    );
    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, dglab_client::ClientError::HandshakeTimeout(_)));
    assert_eq!(client.state(), ConnectionState::Disconnected);

    tokio::time::timeout(WAIT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn server_hangup_ends_session_and_allows_redial() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        for client_id in ["C-1", "C-2"] {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(text(json!({
                "type": "bind", "clientId": client_id, "targetId": "", "message": "targetId"
            })))
            .await
            .unwrap();
            if client_id == "C-1" {
                ws.close(None).await.unwrap();
            } else {
                while let Some(Ok(_)) = ws.next().await {}
            }
        }
    });

    let client = Client::new(ClientConfig::default().with_ws_url(format!("ws://{addr}")));
    client.connect().await.expect("first handshake");
    assert_eq!(client.client_id().as_deref(), Some("C-1"));

    tokio::time::timeout(WAIT, client.disconnected())
        .await
        .expect("hangup should be observed");
    assert_eq!(client.state(), ConnectionState::Disconnected);

    client.connect().await.expect("redial");
    assert_eq!(client.client_id().as_deref(), Some("C-2"));
    assert_eq!(client.state(), ConnectionState::Ready { bound: false });

    client.close().await;
    tokio::time::timeout(WAIT, server).await.unwrap().unwrap();
}
