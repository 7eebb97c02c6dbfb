use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use tabletop_shared::constants::ROLE_GM;

use super::upload::{local_path, local_url};
use crate::error::{ApiError, ApiResult};
use crate::models::{AuthUser, CampaignFile};
use crate::routes::campaigns::member_role;
use crate::AppState;

pub const AVATAR_FOLDER: &str = "avatars";

async fn stream_file(
    upload_dir: &str,
    url: &str,
    content_type: String,
    cache_control: &'static str,
) -> ApiResult<impl IntoResponse> {
    let path = local_path(upload_dir, url).ok_or_else(|| ApiError::not_found("File not found"))?;

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("File not found on disk"))?;

    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, cache_control.to_string()),
        ],
        body,
    ))
}

/// GET /uploads/:campaignId/:name
pub async fn serve_upload(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((campaign_id, name)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let role = member_role(&state.db, &campaign_id, &user.id)
        .await?
        .ok_or_else(|| ApiError::forbidden("Not a member of this campaign"))?;

    let url = local_url(&campaign_id, &name);
    let file = sqlx::query_as::<_, CampaignFile>(
        "SELECT * FROM files WHERE campaign_id = ? AND url = ?",
    )
    .bind(&campaign_id)
    .bind(&url)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("File not found"))?;

    if file.gm_only && role != ROLE_GM {
        return Err(ApiError::forbidden("This file is only available to the GM"));
    }

    stream_file(&state.config.upload_dir, &file.url, file.file_type, "private, max-age=3600").await
}

/// GET /uploads/avatars/:name
pub async fn serve_avatar(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let url = local_url(AVATAR_FOLDER, &name);

    let in_use = sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM "user" WHERE image = ?"#)
        .bind(&url)
        .fetch_one(&state.db)
        .await?;
    if in_use == 0 {
        return Err(ApiError::not_found("File not found"));
    }

    let content_type = mime_from_name(&name).to_string();
    stream_file(
        &state.config.upload_dir,
        &url,
        content_type,
        "public, max-age=31536000, immutable",
    )
    .await
}

fn mime_from_name(name: &str) -> &'static str {
    match name.rsplit('.').next().map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
