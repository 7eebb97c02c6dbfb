use axum::{extract::State, Json};
use std::sync::Arc;

use crate::AppState;

/// GET /api/config
///
/// Client-facing settings: chat poll cadence and which sign-in providers exist.
pub async fn client_config(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "appName": tabletop_shared::constants::APP_NAME,
        "chatPollIntervalSecs": state.config.chat_poll_interval_secs,
        "googleEnabled": state.config.google_enabled(),
        "maxUploadBytes": state.config.max_upload_bytes,
    }))
}
