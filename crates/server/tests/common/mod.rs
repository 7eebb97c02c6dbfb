#![allow(dead_code)]

pub mod ws_helpers;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::sync::Arc;
use tabletop_server::{config::Config, db, routes, AppState};

/// Create an in-memory SQLite pool with schema applied.
pub async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");

    db::apply_schema(&pool).await.unwrap();
    pool
}

/// Config pointing uploads at a fresh temp directory.
pub fn test_config() -> Config {
    let upload_dir = std::env::temp_dir().join(format!("tabletop-test-{}", nanoid::nanoid!(10)));
    std::fs::create_dir_all(&upload_dir).unwrap();

    Config {
        host: "127.0.0.1".into(),
        port: 0,
        database_path: ":memory:".into(),
        upload_dir: upload_dir.to_string_lossy().into_owned(),
        max_upload_bytes: 64 * 1024,
        whiteboard_save_debounce_ms: 50,
        ..Config::default()
    }
}

pub fn create_test_state(pool: SqlitePool) -> Arc<AppState> {
    Arc::new(AppState::new(pool, test_config()))
}

/// Build a test Axum app with the given pool.
pub fn create_test_app(pool: SqlitePool) -> Router {
    routes::build_router(create_test_state(pool))
}

pub fn auth_header(token: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("authorization"),
        format!("Bearer {}", token).parse().unwrap(),
    )
}

/// Create a test user directly in the database. Returns (user_id, session_token).
pub async fn create_test_user(pool: &SqlitePool, email: &str, name: &str) -> (String, String) {
    let user_id = db::new_id();
    let now = db::now();
    let password_hash = tabletop_server::routes::auth::hash_password("password123").unwrap();

    sqlx::query(
        r#"INSERT INTO "user" (id, name, email, password_hash, role, theme, created_at, updated_at)
           VALUES (?, ?, ?, ?, 'user', 'system', ?, ?)"#,
    )
    .bind(&user_id)
    .bind(name)
    .bind(email)
    .bind(&password_hash)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .unwrap();

    sqlx::query(
        r#"INSERT INTO "account" (id, user_id, provider, provider_account_id, created_at)
           VALUES (?, ?, 'credential', ?, ?)"#,
    )
    .bind(db::new_id())
    .bind(&user_id)
    .bind(&user_id)
    .bind(&now)
    .execute(pool)
    .await
    .unwrap();

    let token = create_session(pool, &user_id, chrono::Duration::days(1)).await;
    (user_id, token)
}

/// Insert a session expiring `ttl` from now (negative for an expired one).
pub async fn create_session(pool: &SqlitePool, user_id: &str, ttl: chrono::Duration) -> String {
    let token = nanoid::nanoid!(48);
    sqlx::query(
        r#"INSERT INTO "session" (id, user_id, token, expires_at, created_at)
           VALUES (?, ?, ?, ?, ?)"#,
    )
    .bind(db::new_id())
    .bind(user_id)
    .bind(&token)
    .bind(db::format_timestamp(chrono::Utc::now() + ttl))
    .bind(db::now())
    .execute(pool)
    .await
    .unwrap();
    token
}

pub async fn make_admin(pool: &SqlitePool, user_id: &str) {
    sqlx::query(r#"UPDATE "user" SET role = 'admin' WHERE id = ?"#)
        .bind(user_id)
        .execute(pool)
        .await
        .unwrap();
}

/// Create a campaign with `gm_id` as its GM. Returns the campaign id.
pub async fn create_test_campaign(pool: &SqlitePool, gm_id: &str, name: &str) -> String {
    let campaign_id = db::new_id();
    let now = db::now();

    sqlx::query(
        "INSERT INTO campaigns (id, name, description, created_by_id, created_at, updated_at)
         VALUES (?, ?, NULL, ?, ?, ?)",
    )
    .bind(&campaign_id)
    .bind(name)
    .bind(gm_id)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .unwrap();

    add_member(pool, &campaign_id, gm_id, "GM").await;
    campaign_id
}

/// Add a membership row. Returns the member id.
pub async fn add_member(pool: &SqlitePool, campaign_id: &str, user_id: &str, role: &str) -> String {
    let member_id = db::new_id();
    sqlx::query(
        "INSERT INTO campaign_members (id, campaign_id, user_id, role, joined_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&member_id)
    .bind(campaign_id)
    .bind(user_id)
    .bind(role)
    .bind(db::now())
    .execute(pool)
    .await
    .unwrap();
    member_id
}
