use axum::{
    extract::{Path, Query, State},
    Json,
};
use sqlx::SqlitePool;
use std::sync::Arc;

use tabletop_shared::constants::ROLE_GM;
use tabletop_shared::validation::validate_chat_message;

use super::campaigns::{member_role, require_member};
use crate::db;
use crate::dice::{self, DiceError};
use crate::error::{ApiError, ApiResult};
use crate::models::{AuthUser, ChatMessageResponse, ChatMessageRow, ChatQuery, SendMessageRequest};
use crate::AppState;

const MESSAGE_SELECT: &str = r#"SELECT m.id, m.campaign_id, m.user_id, m.message, m.created_at,
       u.name AS user_name, u.image AS user_image
   FROM chat_messages m
   INNER JOIN "user" u ON u.id = m.user_id"#;

/// Normalise a client-supplied `after` cursor to the stored timestamp format.
fn parse_after(after: &str) -> ApiResult<String> {
    chrono::DateTime::parse_from_rfc3339(after)
        .map(|ts| db::format_timestamp(ts.with_timezone(&chrono::Utc)))
        .map_err(|_| ApiError::bad_request("Invalid 'after' timestamp"))
}

/// Turn a whole-message dice formula into its rolled result; other text passes through.
fn render_chat_message(content: String) -> ApiResult<String> {
    if !dice::is_dice_formula(&content) {
        return Ok(content);
    }
    match dice::parse(&content) {
        Ok(formula) => Ok(formula.roll(&mut rand::thread_rng()).to_message()),
        Err(DiceError::NotAFormula) => Ok(content),
        Err(e) => Err(ApiError::bad_request(e.to_string())),
    }
}

async fn fetch_message(db: &SqlitePool, message_id: &str) -> ApiResult<Option<ChatMessageRow>> {
    let row = sqlx::query_as::<_, ChatMessageRow>(&format!("{} WHERE m.id = ?", MESSAGE_SELECT))
        .bind(message_id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

/// GET /api/chat/:campaignId
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(campaign_id): Path<String>,
    Query(query): Query<ChatQuery>,
) -> ApiResult<Json<Vec<ChatMessageResponse>>> {
    require_member(&state.db, &campaign_id, &user.id).await?;

    let after = query
        .after
        .as_deref()
        .filter(|a| !a.is_empty())
        .map(parse_after)
        .transpose()?;

    let rows = sqlx::query_as::<_, ChatMessageRow>(&format!(
        "{} WHERE m.campaign_id = ? AND (? IS NULL OR m.created_at > ?) ORDER BY m.created_at ASC, m.rowid ASC",
        MESSAGE_SELECT
    ))
    .bind(&campaign_id)
    .bind(&after)
    .bind(&after)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows.into_iter().map(ChatMessageResponse::from).collect()))
}

/// POST /api/chat/:campaignId
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(campaign_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> ApiResult<Json<ChatMessageResponse>> {
    if member_role(&state.db, &campaign_id, &user.id).await?.is_none() {
        return Err(ApiError::forbidden("Not a member of this campaign"));
    }

    let content = body.content.unwrap_or_default();
    validate_chat_message(&content).map_err(ApiError::BadRequest)?;
    let message = render_chat_message(content)?;

    let message_id = db::new_id();
    sqlx::query(
        "INSERT INTO chat_messages (id, campaign_id, user_id, message, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&message_id)
    .bind(&campaign_id)
    .bind(&user.id)
    .bind(&message)
    .bind(db::now())
    .execute(&state.db)
    .await?;

    fetch_message(&state.db, &message_id)
        .await?
        .map(|row| Json(row.into()))
        .ok_or_else(|| ApiError::internal("Chat message vanished after insert"))
}

/// POST /api/chat/:campaignId/clear
pub async fn clear_messages(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(campaign_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    if member_role(&state.db, &campaign_id, &user.id).await?.as_deref() != Some(ROLE_GM) {
        return Err(ApiError::forbidden("Forbidden"));
    }

    let result = sqlx::query("DELETE FROM chat_messages WHERE campaign_id = ?")
        .bind(&campaign_id)
        .execute(&state.db)
        .await?;

    tracing::info!(
        "Cleared {} chat messages in campaign {}",
        result.rows_affected(),
        campaign_id
    );

    Ok(Json(serde_json::json!({ "cleared": result.rows_affected() })))
}
