use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::middleware::auth::{extract_token, resolve_session};
use crate::models::AuthUser;
use crate::routes::campaigns::member_role;
use crate::ws::events::{ClientEvent, ServerEvent};
use crate::ws::gateway::ClientId;
use crate::AppState;

/// Close code sent to sockets that may not join the board.
const CLOSE_NOT_ALLOWED: u16 = 4403;

/// GET /whiteboard/:campaignId
pub async fn whiteboard_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let member = authorize(&state, &campaign_id, &headers, &query).await;
    ws.on_upgrade(move |socket| handle_socket(socket, state, campaign_id, member))
}

/// The connecting user, if their session is valid and they belong to the campaign.
async fn authorize(
    state: &AppState,
    campaign_id: &str,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
) -> Option<AuthUser> {
    let token = query
        .get("token")
        .filter(|t| !t.is_empty())
        .cloned()
        .or_else(|| extract_token(headers))?;

    let user = resolve_session(&state.db, &token).await.ok()?;
    member_role(&state.db, campaign_id, &user.id)
        .await
        .ok()
        .flatten()
        .map(|_| user)
}

async fn handle_socket(
    mut socket: WebSocket,
    state: Arc<AppState>,
    campaign_id: String,
    member: Option<AuthUser>,
) {
    let user = match member {
        Some(u) => u,
        None => {
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: CLOSE_NOT_ALLOWED,
                    reason: "Not a member of this campaign".into(),
                })))
                .await;
            return;
        }
    };

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let peer = match state
        .whiteboard
        .join(&campaign_id, &user.id, &user.name, tx)
        .await
    {
        Ok(peer) => peer,
        Err(e) => {
            tracing::error!("Failed to open whiteboard {}: {}", campaign_id, e);
            return;
        }
    };
    let client_id = peer.client_id;

    tracing::info!(
        "User {} joined whiteboard {} as client {}",
        user.id,
        campaign_id,
        client_id
    );

    // Task to forward messages from mpsc to WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx.send(Message::Text(msg.into())).await.is_err() {
                return;
            }
        }
        // The gateway dropped us: removed from the campaign or the board was discarded
        let _ = ws_tx
            .send(Message::Close(Some(CloseFrame {
                code: CLOSE_NOT_ALLOWED,
                reason: "Removed from campaign".into(),
            })))
            .await;
    });

    // Receive loop
    let state_clone = state.clone();
    let room_id = campaign_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                Message::Text(text) => {
                    let text_str: &str = &text;
                    match serde_json::from_str::<ClientEvent>(text_str) {
                        Ok(event) => {
                            handle_client_event(&state_clone, &room_id, client_id, event).await
                        }
                        Err(e) => {
                            tracing::debug!("Malformed whiteboard event: {}", e);
                            let reply = ServerEvent::Error {
                                message: "Invalid event".into(),
                            };
                            state_clone.whiteboard.send_to(&room_id, client_id, &reply).await;
                        }
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.whiteboard.leave(&campaign_id, client_id).await;
    tracing::info!("Client {} left whiteboard {}", client_id, campaign_id);
}

async fn handle_client_event(
    state: &Arc<AppState>,
    campaign_id: &str,
    client_id: ClientId,
    event: ClientEvent,
) {
    match event {
        ClientEvent::Update { put, remove } => {
            state
                .whiteboard
                .apply_update(campaign_id, client_id, put, remove)
                .await;
        }
        ClientEvent::Presence { cursor } => {
            state
                .whiteboard
                .relay_presence(campaign_id, client_id, cursor)
                .await;
        }
        ClientEvent::Ping => {
            state
                .whiteboard
                .send_to(campaign_id, client_id, &ServerEvent::Pong)
                .await;
        }
    }
}
