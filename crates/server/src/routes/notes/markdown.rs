use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use std::sync::Arc;

use tabletop_shared::constants::ROLE_GM;

use super::fetch_note;
use crate::error::{ApiError, ApiResult};
use crate::models::{AuthUser, NoteRow};
use crate::routes::campaigns::require_member;
use crate::AppState;

/// Lowercased title with every non-alphanumeric character replaced by `_`.
pub fn export_file_name(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{}.md", stem)
}

fn human_timestamp(ts: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(ts)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|_| ts.to_string())
}

pub fn render_markdown(row: &NoteRow) -> String {
    let note = &row.note;
    [
        format!("# {}", note.title),
        String::new(),
        format!("> Created by: {}", row.creator_name),
        format!("> Last updated: {}", human_timestamp(&note.updated_at)),
        if note.gm_only {
            "> GM Only Note".to_string()
        } else {
            String::new()
        },
        String::new(),
        "---".to_string(),
        String::new(),
        note.content.clone(),
    ]
    .join("\n")
}

/// GET /api/notes/:campaignId/:noteId/markdown
pub async fn export_markdown(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((campaign_id, note_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let role = require_member(&state.db, &campaign_id, &user.id).await?;

    let row = match fetch_note(&state.db, &campaign_id, &note_id).await? {
        Some(row) if role == ROLE_GM || !row.note.gm_only => row,
        _ => return Err(ApiError::not_found("Note not found")),
    };

    let disposition = format!(
        "inline; filename=\"{}\"",
        export_file_name(&row.note.title)
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        render_markdown(&row),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_sanitised() {
        assert_eq!(export_file_name("The Lost Mine!"), "the_lost_mine_.md");
    }
}
