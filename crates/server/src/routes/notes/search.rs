use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use tabletop_shared::constants::{NOTE_PREVIEW_LENGTH, NOTE_SEARCH_LIMIT, ROLE_GM};

use crate::error::{ApiError, ApiResult};
use crate::models::{AuthUser, NoteSearchQuery, NoteSearchResult};
use crate::routes::campaigns::require_member;
use crate::AppState;

/// Escape LIKE wildcards so the query matches literally.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// First `NOTE_PREVIEW_LENGTH` characters, with an ellipsis when cut short.
pub fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(NOTE_PREVIEW_LENGTH).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// GET /api/notes/:campaignId/search?q=
pub async fn search_notes(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(campaign_id): Path<String>,
    Query(query): Query<NoteSearchQuery>,
) -> ApiResult<Json<Vec<NoteSearchResult>>> {
    let search_query = match query.q.as_deref() {
        Some(q) if !q.trim().is_empty() => q.trim().to_string(),
        _ => return Err(ApiError::bad_request("Query parameter 'q' is required")),
    };

    let role = require_member(&state.db, &campaign_id, &user.id).await?;
    let pattern = like_pattern(&search_query);

    let rows = sqlx::query_as::<_, (String, String, String)>(
        r#"SELECT id, title, content FROM notes
           WHERE campaign_id = ?
             AND (title LIKE ? ESCAPE '\' OR content LIKE ? ESCAPE '\')
             AND (gm_only = 0 OR ?)
           ORDER BY updated_at DESC
           LIMIT ?"#,
    )
    .bind(&campaign_id)
    .bind(&pattern)
    .bind(&pattern)
    .bind(role == ROLE_GM)
    .bind(NOTE_SEARCH_LIMIT)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(
        rows.into_iter()
            .map(|(id, title, content)| NoteSearchResult {
                id,
                title,
                preview: preview(&content),
            })
            .collect(),
    ))
}
