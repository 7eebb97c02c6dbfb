mod google;
mod session;

pub use google::*;
pub use session::*;

use argon2::{PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{extract::State, Json};
use std::sync::Arc;

use tabletop_shared::constants::{DEFAULT_THEME, USER_ROLE_ADMIN, USER_ROLE_USER};
use tabletop_shared::validation::{validate_email, validate_password};

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{RegisterRequest, RegisterResponse};
use crate::AppState;

pub const PROVIDER_CREDENTIAL: &str = "credential";
pub const PROVIDER_GOOGLE: &str = "google";

pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = argon2::password_hash::SaltString::generate(&mut rand::rngs::OsRng);
    argon2::Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, stored_hash: &str) -> ApiResult<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| ApiError::internal(format!("Corrupt password hash: {}", e)))?;
    Ok(argon2::Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<Json<RegisterResponse>> {
    let name = body.name.unwrap_or_default().trim().to_string();
    let email = body.email.unwrap_or_default().trim().to_lowercase();
    let password = body.password.unwrap_or_default();

    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("Missing required fields"));
    }
    validate_email(&email).map_err(ApiError::BadRequest)?;
    validate_password(&password).map_err(ApiError::BadRequest)?;

    let exists = sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM "user" WHERE email = ?"#)
        .bind(&email)
        .fetch_one(&state.db)
        .await?;
    if exists > 0 {
        return Err(ApiError::bad_request("User already exists"));
    }

    let password_hash = hash_password(&password)?;

    // First account on a fresh install administers it
    let user_count = sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM "user""#)
        .fetch_one(&state.db)
        .await?;
    let role = if user_count == 0 {
        USER_ROLE_ADMIN
    } else {
        USER_ROLE_USER
    };

    let user_id = db::new_id();
    let now = db::now();

    let mut tx = state.db.begin().await?;

    sqlx::query(
        r#"INSERT INTO "user" (id, name, email, password_hash, role, theme, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&user_id)
    .bind(&name)
    .bind(&email)
    .bind(&password_hash)
    .bind(role)
    .bind(DEFAULT_THEME)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"INSERT INTO "account" (id, user_id, provider, provider_account_id, created_at)
           VALUES (?, ?, ?, ?, ?)"#,
    )
    .bind(db::new_id())
    .bind(&user_id)
    .bind(PROVIDER_CREDENTIAL)
    .bind(&user_id)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!("Registered user {} ({})", user_id, role);

    Ok(Json(RegisterResponse {
        id: user_id,
        name,
        email,
        role: role.to_string(),
    }))
}
