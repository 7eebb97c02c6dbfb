use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use sqlx::SqlitePool;
use std::sync::Arc;

use tabletop_shared::constants::{DEFAULT_THEME, MAX_BIO_LENGTH};
use tabletop_shared::validation::{validate_email, validate_password, validate_theme};

use super::auth::hash_password;
use super::files::{
    local_path, local_url, multipart_error, read_file_field, remove_local_file, write_local_file,
    AVATAR_FOLDER,
};
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AuthUser, ImageUploadResponse, ThemeRequest, UpdateImageRequest, UpdateProfileRequest,
    UpdateUserRequest, UserProfile,
};
use crate::AppState;

/// Avatars are small; cap them well below campaign uploads.
const MAX_AVATAR_BYTES: u64 = 5 * 1_048_576;

async fn fetch_profile(db: &SqlitePool, user_id: &str) -> ApiResult<UserProfile> {
    sqlx::query_as::<_, UserProfile>(
        r#"SELECT id, name, email, image, bio FROM "user" WHERE id = ?"#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("User not found"))
}

fn check_bio(bio: &Option<String>) -> ApiResult<()> {
    match bio {
        Some(b) if b.chars().count() > MAX_BIO_LENGTH => Err(ApiError::bad_request(format!(
            "Bio must be at most {} characters",
            MAX_BIO_LENGTH
        ))),
        _ => Ok(()),
    }
}

fn check_name(name: &Option<String>) -> ApiResult<Option<String>> {
    match name.as_deref().map(str::trim) {
        Some("") => Err(ApiError::bad_request("Name cannot be empty")),
        Some(n) => Ok(Some(n.to_string())),
        None => Ok(None),
    }
}

/// GET /api/user/:userId
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UserProfile>> {
    fetch_profile(&state.db, &user_id).await.map(Json)
}

/// PATCH /api/user/:userId
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(user_id): Path<String>,
    Json(body): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserProfile>> {
    if user.id != user_id {
        return Err(ApiError::forbidden("Forbidden"));
    }

    let name = check_name(&body.name)?;
    check_bio(&body.bio)?;

    let email = body.email.map(|e| e.trim().to_lowercase());
    if let Some(ref e) = email {
        validate_email(e).map_err(ApiError::BadRequest)?;
        let taken = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM "user" WHERE email = ? AND id != ?"#,
        )
        .bind(e)
        .bind(&user.id)
        .fetch_one(&state.db)
        .await?;
        if taken > 0 {
            return Err(ApiError::conflict("Email already in use"));
        }
    }

    sqlx::query(
        r#"UPDATE "user"
           SET name = COALESCE(?, name), email = COALESCE(?, email), bio = COALESCE(?, bio), updated_at = ?
           WHERE id = ?"#,
    )
    .bind(&name)
    .bind(&email)
    .bind(&body.bio)
    .bind(db::now())
    .bind(&user.id)
    .execute(&state.db)
    .await?;

    fetch_profile(&state.db, &user.id).await.map(Json)
}

/// POST /api/user/:userId/image
pub async fn set_user_image(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(user_id): Path<String>,
    Json(body): Json<UpdateImageRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if user.id != user_id {
        return Err(ApiError::unauthorized());
    }

    let image = body
        .image
        .filter(|i| !i.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("No image URL provided"))?;

    let previous = sqlx::query_scalar::<_, Option<String>>(r#"SELECT image FROM "user" WHERE id = ?"#)
        .bind(&user.id)
        .fetch_one(&state.db)
        .await?;

    sqlx::query(r#"UPDATE "user" SET image = ?, updated_at = ? WHERE id = ?"#)
        .bind(&image)
        .bind(db::now())
        .bind(&user.id)
        .execute(&state.db)
        .await?;

    if let Some(old) = previous.filter(|p| *p != image) {
        remove_own_avatar(&state, &user.id, &old).await?;
    }

    Ok(Json(serde_json::json!({ "image": image })))
}

/// PUT /api/user/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<UpdateProfileRequest>,
) -> ApiResult<Json<UserProfile>> {
    let name = check_name(&body.name)?;
    check_bio(&body.bio)?;

    let password_hash = match body.new_password.as_deref().filter(|p| !p.is_empty()) {
        Some(p) => {
            validate_password(p).map_err(ApiError::BadRequest)?;
            Some(hash_password(p)?)
        }
        None => None,
    };

    sqlx::query(
        r#"UPDATE "user"
           SET name = COALESCE(?, name), bio = COALESCE(?, bio),
               password_hash = COALESCE(?, password_hash), updated_at = ?
           WHERE id = ?"#,
    )
    .bind(&name)
    .bind(&body.bio)
    .bind(&password_hash)
    .bind(db::now())
    .bind(&user.id)
    .execute(&state.db)
    .await?;

    if password_hash.is_some() {
        tracing::info!("Password changed for user {}", user.id);
    }

    fetch_profile(&state.db, &user.id).await.map(Json)
}

/// POST /api/user/upload-image
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<ImageUploadResponse>> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("file") {
            upload = Some(read_file_field(field, MAX_AVATAR_BYTES).await?);
            break;
        }
    }

    let upload = upload.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    if !upload.content_type.starts_with("image/") {
        return Err(ApiError::bad_request("File must be an image"));
    }

    let ext = upload
        .file_name
        .rsplit('.')
        .next()
        .filter(|e| e.len() <= 10 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("png")
        .to_ascii_lowercase();
    let stored_name = format!("{}-{}.{}", user.id, nanoid::nanoid!(8), ext);

    let image_url = local_url(AVATAR_FOLDER, &stored_name);
    let path = local_path(&state.config.upload_dir, &image_url)
        .ok_or_else(|| ApiError::internal("Avatar path escaped upload dir"))?;
    write_local_file(&path, &upload.data).await?;

    let previous = sqlx::query_scalar::<_, Option<String>>(r#"SELECT image FROM "user" WHERE id = ?"#)
        .bind(&user.id)
        .fetch_one(&state.db)
        .await?;

    sqlx::query(r#"UPDATE "user" SET image = ?, updated_at = ? WHERE id = ?"#)
        .bind(&image_url)
        .bind(db::now())
        .bind(&user.id)
        .execute(&state.db)
        .await?;

    if let Some(old) = previous {
        remove_own_avatar(&state, &user.id, &old).await?;
    }

    Ok(Json(ImageUploadResponse { image_url }))
}

/// Unlink an avatar we stored for `user_id`, unless some user still shows it.
pub(crate) async fn remove_own_avatar(state: &AppState, user_id: &str, url: &str) -> ApiResult<()> {
    let own_prefix = local_url(AVATAR_FOLDER, &format!("{}-", user_id));
    if !url.starts_with(&own_prefix) {
        return Ok(());
    }
    let in_use = sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM "user" WHERE image = ?"#)
        .bind(url)
        .fetch_one(&state.db)
        .await?;
    if in_use == 0 {
        remove_local_file(&state.config.upload_dir, url).await;
    }
    Ok(())
}

/// GET /api/user/theme
pub async fn get_theme(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<serde_json::Value>> {
    let theme = sqlx::query_scalar::<_, String>(r#"SELECT theme FROM "user" WHERE id = ?"#)
        .bind(&user.id)
        .fetch_optional(&state.db)
        .await?
        .unwrap_or_else(|| DEFAULT_THEME.to_string());

    Ok(Json(serde_json::json!({ "theme": theme })))
}

/// PATCH /api/user/theme
pub async fn set_theme(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<ThemeRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let theme = body.theme.unwrap_or_default();
    validate_theme(&theme).map_err(ApiError::BadRequest)?;

    sqlx::query(r#"UPDATE "user" SET theme = ?, updated_at = ? WHERE id = ?"#)
        .bind(&theme)
        .bind(db::now())
        .bind(&user.id)
        .execute(&state.db)
        .await?;

    Ok(Json(serde_json::json!({ "theme": theme })))
}
