#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tabletop_server::{routes, AppState};
use tokio_tungstenite::tungstenite::Message;

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Start the test app on a random TCP port. Returns the base URL and the shared state.
pub async fn start_server() -> (String, Arc<AppState>) {
    let pool = super::setup_test_db().await;
    let state = super::create_test_state(pool);
    let app = routes::build_router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base = format!("http://127.0.0.1:{}", addr.port());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    (base, state)
}

/// Open the whiteboard socket for a campaign with a session token.
pub async fn ws_connect(base: &str, campaign_id: &str, token: &str) -> WsStream {
    let ws_url = format!(
        "{}/whiteboard/{}?token={}",
        base.replace("http://", "ws://"),
        campaign_id,
        token
    );
    let (ws, _) = tokio_tungstenite::connect_async(&ws_url).await.unwrap();
    ws
}

/// Read the next raw frame, with timeout.
pub async fn recv_frame(ws: &mut WsStream) -> Option<Message> {
    match tokio::time::timeout(std::time::Duration::from_secs(3), ws.next()).await {
        Ok(Some(Ok(msg))) => Some(msg),
        _ => None,
    }
}

/// Read next text message parsed as JSON, with timeout.
pub async fn recv_json(ws: &mut WsStream) -> Option<Value> {
    match recv_frame(ws).await {
        Some(Message::Text(text)) => serde_json::from_str(&text).ok(),
        _ => None,
    }
}

/// Read messages until one with the given `type` arrives.
pub async fn recv_type(ws: &mut WsStream, event_type: &str) -> Option<Value> {
    loop {
        let msg = recv_json(ws).await?;
        if msg["type"] == event_type {
            return Some(msg);
        }
    }
}

/// Drain all pending messages until timeout.
pub async fn drain_messages(ws: &mut WsStream) -> Vec<Value> {
    let mut messages = Vec::new();
    loop {
        let timeout =
            tokio::time::timeout(std::time::Duration::from_millis(200), ws.next()).await;
        match timeout {
            Ok(Some(Ok(Message::Text(text)))) => {
                if let Ok(v) = serde_json::from_str::<Value>(&text) {
                    messages.push(v);
                }
            }
            _ => break,
        }
    }
    messages
}

/// Send a JSON message over WebSocket.
pub async fn send_json(ws: &mut WsStream, value: &Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}
