use axum::{
    extract::{
        multipart::{Field, MultipartError},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tabletop_shared::validation::validate_file_name;

use super::{duplicate_name, insert_file, name_taken};
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{AuthUser, CampaignFile};
use crate::routes::campaigns::member_role;
use crate::AppState;

/// URL prefix under which locally stored files are served.
pub const UPLOADS_PREFIX: &str = "/uploads/";

pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

pub fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("File too large".into())
    } else {
        ApiError::bad_request(err.body_text())
    }
}

fn too_large(max_bytes: u64) -> ApiError {
    ApiError::PayloadTooLarge(format!(
        "File size exceeds {}MB limit.",
        max_bytes / 1_048_576
    ))
}

/// Read a file part into memory, stopping as soon as it passes `max_bytes`.
pub async fn read_file_field(mut field: Field<'_>, max_bytes: u64) -> ApiResult<UploadedFile> {
    let file_name = field.file_name().unwrap_or("file").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    let mut data = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if (data.len() + chunk.len()) as u64 > max_bytes {
            return Err(too_large(max_bytes));
        }
        data.extend_from_slice(&chunk);
    }

    Ok(UploadedFile {
        file_name,
        content_type,
        data,
    })
}

/// Public URL of a file stored under `<upload_dir>/<folder>/<name>`.
pub fn local_url(folder: &str, name: &str) -> String {
    format!(
        "{}{}/{}",
        UPLOADS_PREFIX,
        urlencoding::encode(folder),
        urlencoding::encode(name)
    )
}

/// Map a local upload URL back to its path on disk. Anything that would
/// escape the upload directory yields `None`.
pub fn local_path(upload_dir: &str, url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix(UPLOADS_PREFIX)?;
    let mut path = PathBuf::from(upload_dir);
    for segment in rest.split('/') {
        let decoded = urlencoding::decode(segment).ok()?;
        if decoded.is_empty()
            || decoded == "."
            || decoded == ".."
            || decoded.contains(['/', '\\'])
        {
            return None;
        }
        path.push(decoded.as_ref());
    }
    Some(path)
}

/// Unlink a locally stored upload. A file already missing on disk is fine.
pub async fn remove_local_file(upload_dir: &str, url: &str) {
    let Some(path) = local_path(upload_dir, url) else {
        tracing::warn!("Refusing to delete file outside upload dir: {}", url);
        return;
    };
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to delete {}: {}", path.display(), e),
    }
}

/// Remove a deleted campaign's upload folder and everything in it.
pub async fn remove_campaign_folder(upload_dir: &str, campaign_id: &str) {
    let Some(path) = local_path(upload_dir, &local_url(campaign_id, "x"))
        .and_then(|p| p.parent().map(Path::to_path_buf))
    else {
        tracing::warn!("Refusing to delete folder for campaign {}", campaign_id);
        return;
    };
    match tokio::fs::remove_dir_all(&path).await {
        Ok(()) => tracing::debug!("Removed upload folder {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
    }
}

pub async fn write_local_file(path: &Path, data: &[u8]) -> ApiResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to create upload dir: {}", e)))?;
    }
    tokio::fs::write(path, data)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to save file: {}", e)))
}

async fn url_taken(db: &sqlx::SqlitePool, url: &str) -> ApiResult<bool> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM files WHERE url = ?")
        .bind(url)
        .fetch_one(db)
        .await?;
    Ok(count > 0)
}

/// POST /api/files/upload
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<CampaignFile>> {
    let max_bytes = state.config.max_upload_bytes;

    let mut upload = None;
    let mut campaign_id = None;
    let mut gm_only = false;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => upload = Some(read_file_field(field, max_bytes).await?),
            "campaignId" => campaign_id = Some(field.text().await.map_err(multipart_error)?),
            "gmOnly" => gm_only = field.text().await.map_err(multipart_error)?.trim() == "true",
            _ => {}
        }
    }

    let (upload, campaign_id) = match (upload, campaign_id) {
        (Some(u), Some(c)) if !c.trim().is_empty() => (u, c.trim().to_string()),
        _ => return Err(ApiError::bad_request("Missing file or campaignId")),
    };

    let name = upload.file_name.trim().to_string();
    validate_file_name(&name).map_err(ApiError::BadRequest)?;

    if member_role(&state.db, &campaign_id, &user.id).await?.is_none() {
        return Err(ApiError::forbidden("Not a member of this campaign"));
    }
    if name_taken(&state.db, &campaign_id, &name).await? {
        return Err(duplicate_name());
    }

    // A renamed file keeps its original URL, so that name may still be in use on disk
    let mut url = local_url(&campaign_id, &name);
    if url_taken(&state.db, &url).await? {
        url = local_url(&campaign_id, &format!("{}-{}", nanoid::nanoid!(8), name));
    }
    let path = local_path(&state.config.upload_dir, &url)
        .ok_or_else(|| ApiError::bad_request("Invalid file name"))?;
    write_local_file(&path, &upload.data).await?;

    let file = CampaignFile {
        id: db::new_id(),
        campaign_id,
        uploaded_by_id: user.id.clone(),
        name,
        url,
        file_type: upload.content_type,
        size: upload.data.len() as i64,
        gm_only,
        uploaded_at: db::now(),
    };

    if let Err(e) = insert_file(&state.db, &file).await {
        let _ = tokio::fs::remove_file(&path).await;
        return Err(e);
    }

    tracing::info!(
        "Uploaded {} ({} bytes) to campaign {}",
        file.name,
        file.size,
        file.campaign_id
    );

    Ok(Json(file))
}
