use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use super::campaigns::require_member;
use crate::error::ApiResult;
use crate::models::{AuthUser, WhiteboardResponse, WhiteboardRow};
use crate::AppState;

/// GET /api/whiteboard/:campaignId
///
/// Live state when the board is open, otherwise the last saved copy.
pub async fn get_whiteboard(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(campaign_id): Path<String>,
) -> ApiResult<Json<WhiteboardResponse>> {
    require_member(&state.db, &campaign_id, &user.id).await?;

    let saved = sqlx::query_as::<_, WhiteboardRow>(
        "SELECT campaign_id, document, version, updated_at FROM whiteboards WHERE campaign_id = ?",
    )
    .bind(&campaign_id)
    .fetch_optional(&state.db)
    .await?;
    let updated_at = saved.as_ref().map(|row| row.updated_at.clone());

    let (document, version) = match state.whiteboard.snapshot(&campaign_id).await {
        Some(live) => live,
        None => match saved {
            Some(row) => (
                serde_json::from_str(&row.document).unwrap_or_default(),
                row.version,
            ),
            None => Default::default(),
        },
    };

    Ok(Json(WhiteboardResponse {
        campaign_id,
        version,
        document: serde_json::Value::Object(document),
        updated_at,
    }))
}
