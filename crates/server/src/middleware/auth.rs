use axum::{extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use axum_extra::{
    extract::CookieJar,
    headers::{authorization::Bearer, Authorization, HeaderMapExt},
};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::models::AuthUser;
use crate::AppState;

pub const SESSION_COOKIE: &str = "tabletop.session_token";

/// Session token from `Authorization: Bearer` or the session cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string());

    let from_cookie = CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string());

    from_header.or(from_cookie).filter(|t| !t.is_empty())
}

/// Resolve a session token to its user, rejecting unknown and expired sessions.
pub async fn resolve_session(db: &sqlx::SqlitePool, token: &str) -> ApiResult<AuthUser> {
    let row = sqlx::query_as::<_, (String, String, String, String, String)>(
        r#"SELECT u.id, u.name, u.email, u.role, s.expires_at
           FROM "session" s
           JOIN "user" u ON u.id = s.user_id
           WHERE s.token = ?"#,
    )
    .bind(token)
    .fetch_optional(db)
    .await?;

    let (id, name, email, role, expires_at) =
        row.ok_or_else(|| ApiError::Unauthorized("Invalid session".into()))?;

    if expires_at < crate::db::now() {
        return Err(ApiError::Unauthorized("Session expired".into()));
    }

    Ok(AuthUser {
        id,
        name,
        email,
        role,
    })
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".into()))?;

        resolve_session(&state.db, &token).await
    }
}

/// Signed-in user that must also hold the `admin` account role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::unauthorized());
        }
        Ok(AdminUser(user))
    }
}
