use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Redirect},
    Json,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tabletop_shared::constants::{DEFAULT_THEME, USER_ROLE_USER};

use super::{create_session, session_cookie, PROVIDER_GOOGLE};
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{GoogleProfile, GoogleTokenResponse, OAuthCallbackQuery};
use crate::AppState;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// How long an authorization `state` nonce stays redeemable.
const STATE_TTL: Duration = Duration::from_secs(600);

/// GET /api/auth/google
pub async fn google_auth_url(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<serde_json::Value>> {
    if !state.config.google_enabled() {
        return Err(ApiError::ServiceUnavailable(
            "Google sign-in is not configured".into(),
        ));
    }

    let nonce = nanoid::nanoid!(32);
    {
        let mut pending = state.oauth_pending.write().await;
        pending.retain(|_, issued| issued.elapsed() < STATE_TTL);
        pending.insert(nonce.clone(), Instant::now());
    }

    let url = url::Url::parse_with_params(
        GOOGLE_AUTH_URL,
        &[
            ("client_id", state.config.google_client_id.as_str()),
            ("redirect_uri", state.config.google_redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", "openid email profile"),
            ("state", nonce.as_str()),
        ],
    )
    .map_err(|e| ApiError::internal(format!("Bad Google auth URL: {}", e)))?;

    Ok(Json(serde_json::json!({
        "url": url.to_string(),
        "state": nonce,
    })))
}

/// GET /api/auth/google/callback
pub async fn google_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OAuthCallbackQuery>,
) -> ApiResult<impl IntoResponse> {
    if let Some(error) = query.error {
        return Err(ApiError::bad_request(format!("Google sign-in failed: {}", error)));
    }

    let code = query
        .code
        .ok_or_else(|| ApiError::bad_request("Missing authorization code"))?;
    let nonce = query
        .state
        .ok_or_else(|| ApiError::bad_request("Missing state parameter"))?;

    let issued = state.oauth_pending.write().await.remove(&nonce);
    match issued {
        Some(at) if at.elapsed() < STATE_TTL => {}
        _ => return Err(ApiError::bad_request("Sign-in session expired, please try again")),
    }

    if !state.config.google_enabled() {
        return Err(ApiError::ServiceUnavailable(
            "Google sign-in is not configured".into(),
        ));
    }

    let profile = fetch_google_profile(&state, &code).await?;
    let user_id = link_google_account(&state, &profile).await?;

    let ttl = state.config.session_ttl_hours;
    let token = create_session(&state.db, &user_id, ttl).await?;

    tracing::info!("Google sign-in for user {}", user_id);

    Ok((
        [(header::SET_COOKIE, session_cookie(&token, ttl))],
        Redirect::to(&state.config.app_url),
    ))
}

async fn fetch_google_profile(state: &AppState, code: &str) -> ApiResult<GoogleProfile> {
    let res = state
        .http
        .post(GOOGLE_TOKEN_URL)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", state.config.google_redirect_uri.as_str()),
            ("client_id", state.config.google_client_id.as_str()),
            ("client_secret", state.config.google_client_secret.as_str()),
        ])
        .send()
        .await
        .map_err(|e| ApiError::BadGateway(format!("Google token request failed: {}", e)))?;

    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        return Err(ApiError::BadGateway(format!(
            "Google token exchange failed ({}): {}",
            status, body
        )));
    }

    let tokens: GoogleTokenResponse = res
        .json()
        .await
        .map_err(|e| ApiError::BadGateway(format!("Bad Google token response: {}", e)))?;

    let res = state
        .http
        .get(GOOGLE_USERINFO_URL)
        .bearer_auth(&tokens.access_token)
        .send()
        .await
        .map_err(|e| ApiError::BadGateway(format!("Google profile request failed: {}", e)))?;

    if !res.status().is_success() {
        return Err(ApiError::BadGateway(format!(
            "Google profile request failed ({})",
            res.status()
        )));
    }

    res.json()
        .await
        .map_err(|e| ApiError::BadGateway(format!("Bad Google profile response: {}", e)))
}

/// Find the user behind a Google profile, creating one on first sign-in.
///
/// A Google account whose email matches an existing user is linked to it.
pub async fn link_google_account(state: &AppState, profile: &GoogleProfile) -> ApiResult<String> {
    let email = profile.email.trim().to_lowercase();

    let linked = sqlx::query_scalar::<_, String>(
        r#"SELECT user_id FROM "account" WHERE provider = ? AND provider_account_id = ?"#,
    )
    .bind(PROVIDER_GOOGLE)
    .bind(&profile.sub)
    .fetch_optional(&state.db)
    .await?;
    if let Some(user_id) = linked {
        return Ok(user_id);
    }

    let now = db::now();
    let existing = sqlx::query_scalar::<_, String>(r#"SELECT id FROM "user" WHERE email = ?"#)
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;

    let user_id = match existing {
        Some(id) => id,
        None => {
            let id = db::new_id();
            let name = profile
                .name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
            sqlx::query(
                r#"INSERT INTO "user" (id, name, email, role, image, theme, created_at, updated_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(&id)
            .bind(&name)
            .bind(&email)
            .bind(USER_ROLE_USER)
            .bind(&profile.picture)
            .bind(DEFAULT_THEME)
            .bind(&now)
            .bind(&now)
            .execute(&state.db)
            .await?;
            id
        }
    };

    sqlx::query(
        r#"INSERT OR IGNORE INTO "account" (id, user_id, provider, provider_account_id, created_at)
           VALUES (?, ?, ?, ?, ?)"#,
    )
    .bind(db::new_id())
    .bind(&user_id)
    .bind(PROVIDER_GOOGLE)
    .bind(&profile.sub)
    .bind(&now)
    .execute(&state.db)
    .await?;

    Ok(user_id)
}
