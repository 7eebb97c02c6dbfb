mod serve;
mod upload;

pub use serve::*;
pub use upload::*;

use axum::{
    extract::{Path, State},
    Json,
};
use sqlx::SqlitePool;
use std::sync::Arc;

use tabletop_shared::constants::ROLE_GM;
use tabletop_shared::validation::validate_file_name;

use super::campaigns::{member_role, require_gm, require_member};
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AuthUser, CampaignFile, DownloadResponse, FileResponse, FileRow, GmOnlyRequest,
    RegisterFileRequest, RenameFileRequest,
};
use crate::AppState;

const DEFAULT_FILE_TYPE: &str = "application/pdf";

pub(crate) async fn fetch_file(
    db: &SqlitePool,
    campaign_id: &str,
    file_id: &str,
) -> ApiResult<Option<CampaignFile>> {
    let file = sqlx::query_as::<_, CampaignFile>(
        "SELECT * FROM files WHERE id = ? AND campaign_id = ?",
    )
    .bind(file_id)
    .bind(campaign_id)
    .fetch_optional(db)
    .await?;
    Ok(file)
}

pub(crate) async fn name_taken(db: &SqlitePool, campaign_id: &str, name: &str) -> ApiResult<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM files WHERE campaign_id = ? AND name = ?",
    )
    .bind(campaign_id)
    .bind(name)
    .fetch_one(db)
    .await?;
    Ok(count > 0)
}

pub(crate) fn duplicate_name() -> ApiError {
    ApiError::conflict("A file with this name already exists in this campaign.")
}

/// GET /api/files/:campaignId
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(campaign_id): Path<String>,
) -> ApiResult<Json<Vec<FileResponse>>> {
    let role = require_member(&state.db, &campaign_id, &user.id).await?;

    let rows = sqlx::query_as::<_, FileRow>(
        r#"SELECT f.*, u.name AS uploader_name, u.image AS uploader_image
           FROM files f
           INNER JOIN "user" u ON u.id = f.uploaded_by_id
           WHERE f.campaign_id = ? AND (f.gm_only = 0 OR ?)
           ORDER BY f.uploaded_at DESC, f.rowid DESC"#,
    )
    .bind(&campaign_id)
    .bind(role == ROLE_GM)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows.into_iter().map(FileResponse::from).collect()))
}

/// POST /api/files
pub async fn register_file(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<RegisterFileRequest>,
) -> ApiResult<Json<CampaignFile>> {
    let (campaign_id, name, url) = match (body.campaign_id, body.name, body.url) {
        (Some(c), Some(n), Some(u)) if !c.is_empty() && !n.trim().is_empty() && !u.is_empty() => {
            (c, n.trim().to_string(), u)
        }
        _ => return Err(ApiError::bad_request("Missing required fields")),
    };
    validate_file_name(&name).map_err(ApiError::BadRequest)?;
    // Local paths only come from uploads
    if url.starts_with('/') {
        return Err(ApiError::bad_request("Invalid file URL"));
    }

    if member_role(&state.db, &campaign_id, &user.id).await?.is_none() {
        return Err(ApiError::forbidden("Not a member of this campaign"));
    }
    if name_taken(&state.db, &campaign_id, &name).await? {
        return Err(duplicate_name());
    }

    let file = CampaignFile {
        id: db::new_id(),
        campaign_id,
        uploaded_by_id: user.id.clone(),
        name,
        url,
        file_type: body
            .file_type
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_FILE_TYPE.to_string()),
        size: body.size.unwrap_or(0),
        gm_only: body.gm_only.unwrap_or(false),
        uploaded_at: db::now(),
    };
    insert_file(&state.db, &file).await?;

    Ok(Json(file))
}

pub(crate) async fn insert_file(db: &SqlitePool, file: &CampaignFile) -> ApiResult<()> {
    let result = sqlx::query(
        r#"INSERT INTO files (id, campaign_id, uploaded_by_id, name, url, type, size, gm_only, uploaded_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&file.id)
    .bind(&file.campaign_id)
    .bind(&file.uploaded_by_id)
    .bind(&file.name)
    .bind(&file.url)
    .bind(&file.file_type)
    .bind(file.size)
    .bind(file.gm_only)
    .bind(&file.uploaded_at)
    .execute(db)
    .await;

    match result {
        Ok(_) => Ok(()),
        // Lost a race with a concurrent upload of the same name
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(duplicate_name()),
        Err(e) => Err(e.into()),
    }
}

/// DELETE /api/files/:campaignId/:fileId
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((campaign_id, file_id)): Path<(String, String)>,
) -> ApiResult<Json<CampaignFile>> {
    let file = fetch_file(&state.db, &campaign_id, &file_id)
        .await?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    require_gm(&state.db, &campaign_id, &user.id).await?;

    if file.url.starts_with('/') {
        if owns_local_file(&state.db, &file).await? {
            remove_local_file(&state.config.upload_dir, &file.url).await;
        } else {
            tracing::warn!("Not unlinking {} for file {}", file.url, file.id);
        }
    } else {
        delete_hosted_file(&state, &file.url).await?;
    }

    sqlx::query("DELETE FROM files WHERE id = ?")
        .bind(&file.id)
        .execute(&state.db)
        .await?;

    tracing::info!("File {} deleted from campaign {}", file.id, campaign_id);

    Ok(Json(file))
}

/// A local file may only be unlinked through a record of the campaign whose
/// folder holds it, and only when no other record points at it.
async fn owns_local_file(db: &SqlitePool, file: &CampaignFile) -> ApiResult<bool> {
    let folder = local_url(&file.campaign_id, "");
    if !file.url.starts_with(&folder) || file.url.len() == folder.len() {
        return Ok(false);
    }
    let others = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM files WHERE url = ? AND id != ?")
        .bind(&file.url)
        .bind(&file.id)
        .fetch_one(db)
        .await?;
    Ok(others == 0)
}

/// Delete a file stored by the hosted file service. Failures are logged and
/// swallowed so the record can still be removed.
async fn delete_hosted_file(state: &AppState, url: &str) -> ApiResult<()> {
    let secret = &state.config.file_service_secret;
    if secret.is_empty() {
        return Err(ApiError::internal(
            "FILE_SERVICE_SECRET is not set, cannot delete hosted file",
        ));
    }

    let file_key = url
        .split(['?', '#'])
        .next()
        .and_then(|u| u.rsplit('/').next())
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::bad_request("Invalid file URL format"))?;

    let res = state
        .http
        .post(format!(
            "{}/deleteFile",
            state.config.file_service_url.trim_end_matches('/')
        ))
        .header("x-uploadthing-api-key", secret)
        .json(&serde_json::json!({ "fileKeys": [file_key] }))
        .send()
        .await;

    match res {
        Ok(r) if r.status().is_success() => {
            tracing::debug!("Deleted hosted file {}", file_key);
        }
        Ok(r) => {
            let status = r.status();
            let body = r.text().await.unwrap_or_default();
            tracing::warn!(
                "Hosted file service refused delete of {} ({}): {}",
                file_key,
                status,
                body
            );
        }
        Err(e) => {
            tracing::warn!("Hosted file delete of {} failed: {}", file_key, e);
        }
    }
    Ok(())
}

/// PATCH /api/files/:campaignId/:fileId/gm-only
pub async fn set_file_gm_only(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((campaign_id, file_id)): Path<(String, String)>,
    Json(body): Json<GmOnlyRequest>,
) -> ApiResult<Json<CampaignFile>> {
    require_gm(&state.db, &campaign_id, &user.id).await?;

    let gm_only = body
        .gm_only
        .as_bool()
        .ok_or_else(|| ApiError::bad_request("gmOnly must be a boolean"))?;

    let mut file = fetch_file(&state.db, &campaign_id, &file_id)
        .await?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    sqlx::query("UPDATE files SET gm_only = ? WHERE id = ?")
        .bind(gm_only)
        .bind(&file.id)
        .execute(&state.db)
        .await?;

    file.gm_only = gm_only;
    Ok(Json(file))
}

/// PATCH /api/files/:campaignId/:fileId/rename
pub async fn rename_file(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((campaign_id, file_id)): Path<(String, String)>,
    Json(body): Json<RenameFileRequest>,
) -> ApiResult<Json<CampaignFile>> {
    require_gm(&state.db, &campaign_id, &user.id).await?;

    let name = body.name.unwrap_or_default().trim().to_string();
    validate_file_name(&name).map_err(ApiError::BadRequest)?;

    let mut file = fetch_file(&state.db, &campaign_id, &file_id)
        .await?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    if file.name == name {
        return Ok(Json(file));
    }
    if name_taken(&state.db, &campaign_id, &name).await? {
        return Err(duplicate_name());
    }

    sqlx::query("UPDATE files SET name = ? WHERE id = ?")
        .bind(&name)
        .bind(&file.id)
        .execute(&state.db)
        .await?;

    file.name = name;
    Ok(Json(file))
}

/// GET /api/files/:campaignId/:fileId/download
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((campaign_id, file_id)): Path<(String, String)>,
) -> ApiResult<Json<DownloadResponse>> {
    let role = member_role(&state.db, &campaign_id, &user.id)
        .await?
        .ok_or_else(|| ApiError::forbidden("Not a member of this campaign"))?;

    let file = fetch_file(&state.db, &campaign_id, &file_id)
        .await?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    if file.gm_only && role != ROLE_GM {
        return Err(ApiError::forbidden("This file is only available to the GM"));
    }

    Ok(Json(DownloadResponse { url: file.url }))
}
