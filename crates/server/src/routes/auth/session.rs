use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use sqlx::SqlitePool;
use std::sync::Arc;

use super::verify_password;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::{extract_token, resolve_session, SESSION_COOKIE};
use crate::models::{SessionUser, SignInRequest, SignInResponse};
use crate::AppState;

/// Insert a session row for the user and return its token.
pub async fn create_session(db: &SqlitePool, user_id: &str, ttl_hours: i64) -> ApiResult<String> {
    let token = nanoid::nanoid!(48);
    let expires_at = db::format_timestamp(chrono::Utc::now() + chrono::Duration::hours(ttl_hours));

    sqlx::query(
        r#"INSERT INTO "session" (id, user_id, token, expires_at, created_at)
           VALUES (?, ?, ?, ?, ?)"#,
    )
    .bind(db::new_id())
    .bind(user_id)
    .bind(&token)
    .bind(&expires_at)
    .bind(db::now())
    .execute(db)
    .await?;

    Ok(token)
}

pub fn session_cookie(token: &str, ttl_hours: i64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl_hours * 3600
    )
}

fn cleared_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE)
}

pub async fn fetch_session_user(db: &SqlitePool, user_id: &str) -> ApiResult<Option<SessionUser>> {
    let user = sqlx::query_as::<_, SessionUser>(
        r#"SELECT id, name, email, image, role, theme FROM "user" WHERE id = ?"#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(user)
}

/// POST /api/auth/sign-in
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignInRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = body.email.unwrap_or_default().trim().to_lowercase();
    let password = body.password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let row = sqlx::query_as::<_, (String, Option<String>)>(
        r#"SELECT id, password_hash FROM "user" WHERE email = ?"#,
    )
    .bind(&email)
    .fetch_optional(&state.db)
    .await?;

    // OAuth-only accounts have no password to check against
    let (user_id, stored_hash) = match row {
        Some((id, Some(hash))) => (id, hash),
        _ => return Err(ApiError::Unauthorized("Invalid credentials".into())),
    };

    if !verify_password(&password, &stored_hash)? {
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let ttl = state.config.session_ttl_hours;
    let token = create_session(&state.db, &user_id, ttl).await?;
    let user = fetch_session_user(&state.db, &user_id)
        .await?
        .ok_or_else(|| ApiError::internal("User vanished during sign-in"))?;

    Ok((
        [(header::SET_COOKIE, session_cookie(&token, ttl))],
        Json(SignInResponse { user, token }),
    ))
}

/// POST /api/auth/sign-out
pub async fn sign_out(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    if let Some(token) = extract_token(&headers) {
        sqlx::query(r#"DELETE FROM "session" WHERE token = ?"#)
            .bind(&token)
            .execute(&state.db)
            .await?;
    }

    Ok((
        [(header::SET_COOKIE, cleared_cookie())],
        Json(serde_json::json!({})),
    ))
}

/// GET /api/auth/session
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let token = match extract_token(&headers) {
        Some(t) => t,
        None => return Ok(Json(serde_json::Value::Null)),
    };

    let auth = match resolve_session(&state.db, &token).await {
        Ok(user) => user,
        Err(ApiError::Unauthorized(_)) => return Ok(Json(serde_json::Value::Null)),
        Err(e) => return Err(e),
    };

    let user = fetch_session_user(&state.db, &auth.id).await?;
    Ok(Json(match user {
        Some(user) => serde_json::json!({ "user": user }),
        None => serde_json::Value::Null,
    }))
}
