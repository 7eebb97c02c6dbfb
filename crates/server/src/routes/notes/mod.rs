mod markdown;
mod search;

pub use markdown::*;
pub use search::*;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use sqlx::SqlitePool;
use std::sync::Arc;

use tabletop_shared::constants::ROLE_GM;
use tabletop_shared::validation::validate_note_title;

use super::campaigns::{require_gm, require_member};
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AuthUser, CreateNoteRequest, GmOnlyRequest, NoteResponse, NoteRow, UpdateNoteRequest,
    UpsertNoteRequest,
};
use crate::AppState;

const NOTE_SELECT: &str = r#"SELECT n.id, n.campaign_id, n.created_by_id, n.title, n.content, n.gm_only,
       n.created_at, n.updated_at, u.name AS creator_name, u.email AS creator_email
   FROM notes n
   INNER JOIN "user" u ON u.id = n.created_by_id"#;

/// A note of this campaign, or `None` when it belongs elsewhere or does not exist.
pub(crate) async fn fetch_note(
    db: &SqlitePool,
    campaign_id: &str,
    note_id: &str,
) -> ApiResult<Option<NoteRow>> {
    let note = sqlx::query_as::<_, NoteRow>(&format!(
        "{} WHERE n.id = ? AND n.campaign_id = ?",
        NOTE_SELECT
    ))
    .bind(note_id)
    .bind(campaign_id)
    .fetch_optional(db)
    .await?;
    Ok(note)
}

/// Same as [`fetch_note`] but also hides GM-only notes from players.
async fn fetch_visible_note(
    db: &SqlitePool,
    campaign_id: &str,
    note_id: &str,
    is_gm: bool,
) -> ApiResult<NoteRow> {
    match fetch_note(db, campaign_id, note_id).await? {
        Some(row) if is_gm || !row.note.gm_only => Ok(row),
        _ => Err(ApiError::not_found("Note not found")),
    }
}

fn required_content(content: Option<String>) -> ApiResult<String> {
    content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Content is required"))
}

fn default_title(user: &AuthUser) -> String {
    format!(
        "Note by {} at {}",
        user.name,
        chrono::Utc::now().format("%Y-%m-%d %H:%M UTC")
    )
}

/// Explicit title if one was sent, validated.
fn given_title(title: Option<String>) -> ApiResult<Option<String>> {
    match title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
        Some(t) => {
            validate_note_title(&t).map_err(ApiError::BadRequest)?;
            Ok(Some(t))
        }
        None => Ok(None),
    }
}

async fn insert_note(
    db: &SqlitePool,
    campaign_id: &str,
    user_id: &str,
    title: &str,
    content: &str,
    gm_only: bool,
) -> ApiResult<String> {
    let note_id = db::new_id();
    let now = db::now();
    sqlx::query(
        r#"INSERT INTO notes (id, campaign_id, created_by_id, title, content, gm_only, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&note_id)
    .bind(campaign_id)
    .bind(user_id)
    .bind(title)
    .bind(content)
    .bind(gm_only)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;
    Ok(note_id)
}

async fn note_response(db: &SqlitePool, campaign_id: &str, note_id: &str) -> ApiResult<Json<NoteResponse>> {
    fetch_note(db, campaign_id, note_id)
        .await?
        .map(|row| Json(row.into()))
        .ok_or_else(|| ApiError::not_found("Note not found"))
}

/// GET /api/notes/:campaignId
pub async fn list_notes(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(campaign_id): Path<String>,
) -> ApiResult<Json<Vec<NoteResponse>>> {
    let role = require_member(&state.db, &campaign_id, &user.id).await?;

    let rows = sqlx::query_as::<_, NoteRow>(&format!(
        "{} WHERE n.campaign_id = ? AND (n.gm_only = 0 OR ?) ORDER BY n.created_at DESC, n.rowid DESC",
        NOTE_SELECT
    ))
    .bind(&campaign_id)
    .bind(role == ROLE_GM)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows.into_iter().map(NoteResponse::from).collect()))
}

/// POST /api/notes/:campaignId
pub async fn create_note(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(campaign_id): Path<String>,
    Json(body): Json<CreateNoteRequest>,
) -> ApiResult<Json<NoteResponse>> {
    let content = required_content(body.content)?;
    let role = require_member(&state.db, &campaign_id, &user.id).await?;

    let gm_only = body.gm_only.unwrap_or(false);
    if gm_only && role != ROLE_GM {
        return Err(ApiError::forbidden("Only GMs can create GM-only notes"));
    }

    let title = given_title(body.title)?.unwrap_or_else(|| default_title(&user));
    let note_id = insert_note(&state.db, &campaign_id, &user.id, &title, &content, gm_only).await?;

    note_response(&state.db, &campaign_id, &note_id).await
}

/// PUT /api/notes/:campaignId
///
/// Creates the note when no id is given or the id is unknown, otherwise
/// updates its content, visibility and (if sent) title.
pub async fn upsert_note(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(campaign_id): Path<String>,
    Json(body): Json<UpsertNoteRequest>,
) -> ApiResult<Json<NoteResponse>> {
    let content = required_content(body.content)?;
    let role = require_member(&state.db, &campaign_id, &user.id).await?;
    let is_gm = role == ROLE_GM;

    let gm_only = body.gm_only.unwrap_or(false);
    if gm_only && !is_gm {
        return Err(ApiError::forbidden("Only GMs can create/update GM-only notes"));
    }
    let title = given_title(body.title)?;

    let existing_campaign = match body.id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => sqlx::query_as::<_, (String, String, bool)>(
            "SELECT id, campaign_id, gm_only FROM notes WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&state.db)
        .await?,
        None => None,
    };

    let note_id = match existing_campaign {
        Some((id, note_campaign, was_gm_only)) => {
            if note_campaign != campaign_id || (was_gm_only && !is_gm) {
                return Err(ApiError::not_found("Note not found"));
            }
            sqlx::query(
                "UPDATE notes SET content = ?, gm_only = ?, title = COALESCE(?, title), updated_at = ? WHERE id = ?",
            )
            .bind(&content)
            .bind(gm_only)
            .bind(&title)
            .bind(db::now())
            .bind(&id)
            .execute(&state.db)
            .await?;
            id
        }
        None => {
            let title = title.unwrap_or_else(|| default_title(&user));
            insert_note(&state.db, &campaign_id, &user.id, &title, &content, gm_only).await?
        }
    };

    note_response(&state.db, &campaign_id, &note_id).await
}

/// GET /api/notes/:campaignId/:noteId
pub async fn get_note(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((campaign_id, note_id)): Path<(String, String)>,
) -> ApiResult<Json<NoteResponse>> {
    let role = require_member(&state.db, &campaign_id, &user.id).await?;
    let row = fetch_visible_note(&state.db, &campaign_id, &note_id, role == ROLE_GM).await?;
    Ok(Json(row.into()))
}

/// PATCH /api/notes/:campaignId/:noteId
pub async fn update_note(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((campaign_id, note_id)): Path<(String, String)>,
    Json(body): Json<UpdateNoteRequest>,
) -> ApiResult<Json<NoteResponse>> {
    let content = required_content(body.content)?;
    let title = given_title(body.title)?.ok_or_else(|| ApiError::bad_request("Title is required"))?;

    let role = require_member(&state.db, &campaign_id, &user.id).await?;
    let is_gm = role == ROLE_GM;

    let gm_only = body.gm_only.unwrap_or(false);
    if gm_only && !is_gm {
        return Err(ApiError::forbidden("Only GMs can update GM-only notes"));
    }

    fetch_visible_note(&state.db, &campaign_id, &note_id, is_gm).await?;

    sqlx::query("UPDATE notes SET title = ?, content = ?, gm_only = ?, updated_at = ? WHERE id = ?")
        .bind(&title)
        .bind(&content)
        .bind(gm_only)
        .bind(db::now())
        .bind(&note_id)
        .execute(&state.db)
        .await?;

    note_response(&state.db, &campaign_id, &note_id).await
}

/// DELETE /api/notes/:campaignId/:noteId
pub async fn delete_note(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((campaign_id, note_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let role = require_member(&state.db, &campaign_id, &user.id).await?;

    let row = fetch_note(&state.db, &campaign_id, &note_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Note not found"))?;

    if row.note.created_by_id != user.id && role != ROLE_GM {
        return Err(ApiError::unauthorized());
    }

    sqlx::query("DELETE FROM notes WHERE id = ?")
        .bind(&note_id)
        .execute(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/notes/:campaignId/:noteId/gm-only
pub async fn set_note_gm_only(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((campaign_id, note_id)): Path<(String, String)>,
    Json(body): Json<GmOnlyRequest>,
) -> ApiResult<Json<NoteResponse>> {
    require_gm(&state.db, &campaign_id, &user.id).await?;

    let gm_only = body
        .gm_only
        .as_bool()
        .ok_or_else(|| ApiError::bad_request("gmOnly must be a boolean"))?;

    let result = sqlx::query("UPDATE notes SET gm_only = ?, updated_at = ? WHERE id = ? AND campaign_id = ?")
        .bind(gm_only)
        .bind(db::now())
        .bind(&note_id)
        .bind(&campaign_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Note not found"));
    }

    note_response(&state.db, &campaign_id, &note_id).await
}
