mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

async fn setup() -> (TestServer, sqlx::SqlitePool) {
    let pool = common::setup_test_db().await;
    let app = common::create_test_app(pool.clone());
    (TestServer::new(app).unwrap(), pool)
}

#[tokio::test]
async fn first_registered_user_is_admin() {
    let (server, _pool) = setup().await;

    let res = server
        .post("/api/auth/register")
        .json(&json!({ "name": "Ada", "email": "Ada@Example.com", "password": "password123" }))
        .await;
    res.assert_status_ok();
    let body: Value = res.json();
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["role"], "admin");

    let res = server
        .post("/api/auth/register")
        .json(&json!({ "name": "Bob", "email": "bob@example.com", "password": "password123" }))
        .await;
    res.assert_status_ok();
    assert_eq!(res.json::<Value>()["role"], "user");
}

#[tokio::test]
async fn register_rejects_bad_input() {
    let (server, _pool) = setup().await;

    server
        .post("/api/auth/register")
        .json(&json!({ "email": "a@example.com", "password": "password123" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .post("/api/auth/register")
        .json(&json!({ "name": "A", "email": "not-an-email", "password": "password123" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .post("/api/auth/register")
        .json(&json!({ "name": "A", "email": "a@example.com", "password": "short" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_duplicate_email_returns_400() {
    let (server, pool) = setup().await;
    common::create_test_user(&pool, "taken@example.com", "Taken").await;

    let res = server
        .post("/api/auth/register")
        .json(&json!({ "name": "Other", "email": "taken@example.com", "password": "password123" }))
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>()["error"], "User already exists");
}

#[tokio::test]
async fn sign_in_returns_token_and_cookie() {
    let (server, pool) = setup().await;
    common::create_test_user(&pool, "gm@example.com", "Gamemaster").await;

    let res = server
        .post("/api/auth/sign-in")
        .json(&json!({ "email": "gm@example.com", "password": "password123" }))
        .await;
    res.assert_status_ok();

    let cookie = res.header("set-cookie");
    let cookie = cookie.to_str().unwrap();
    assert!(cookie.starts_with("tabletop.session_token="));
    assert!(cookie.contains("HttpOnly"));

    let body: Value = res.json();
    assert_eq!(body["user"]["name"], "Gamemaster");
    let token = body["token"].as_str().unwrap();

    let (h, v) = common::auth_header(token);
    let res = server.get("/api/auth/session").add_header(h, v).await;
    res.assert_status_ok();
    assert_eq!(res.json::<Value>()["user"]["email"], "gm@example.com");
}

#[tokio::test]
async fn sign_in_wrong_password_returns_401() {
    let (server, pool) = setup().await;
    common::create_test_user(&pool, "gm@example.com", "Gamemaster").await;

    server
        .post("/api/auth/sign-in")
        .json(&json!({ "email": "gm@example.com", "password": "wrong-password" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    server
        .post("/api/auth/sign-in")
        .json(&json!({ "email": "nobody@example.com", "password": "password123" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_cookie_authenticates_requests() {
    let (server, pool) = setup().await;
    let (_id, token) = common::create_test_user(&pool, "gm@example.com", "Gamemaster").await;

    let res = server
        .get("/api/campaigns")
        .add_header(
            axum::http::header::COOKIE,
            format!("tabletop.session_token={}", token)
                .parse::<axum::http::HeaderValue>()
                .unwrap(),
        )
        .await;
    res.assert_status_ok();
}

#[tokio::test]
async fn session_is_null_without_valid_token() {
    let (server, pool) = setup().await;

    let res = server.get("/api/auth/session").await;
    res.assert_status_ok();
    assert!(res.json::<Value>().is_null());

    let (user_id, _) = common::create_test_user(&pool, "gm@example.com", "Gamemaster").await;
    let expired = common::create_session(&pool, &user_id, chrono::Duration::hours(-1)).await;
    let (h, v) = common::auth_header(&expired);
    let res = server.get("/api/auth/session").add_header(h, v).await;
    res.assert_status_ok();
    assert!(res.json::<Value>().is_null());
}

#[tokio::test]
async fn expired_session_is_rejected_on_protected_routes() {
    let (server, pool) = setup().await;
    let (user_id, _) = common::create_test_user(&pool, "gm@example.com", "Gamemaster").await;
    let expired = common::create_session(&pool, &user_id, chrono::Duration::hours(-1)).await;

    let (h, v) = common::auth_header(&expired);
    let res = server.get("/api/campaigns").add_header(h, v).await;
    res.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(res.json::<Value>()["error"], "Session expired");
}

#[tokio::test]
async fn sign_out_invalidates_token() {
    let (server, pool) = setup().await;
    let (_id, token) = common::create_test_user(&pool, "gm@example.com", "Gamemaster").await;

    let (h, v) = common::auth_header(&token);
    server
        .post("/api/auth/sign-out")
        .add_header(h, v)
        .await
        .assert_status_ok();

    let (h, v) = common::auth_header(&token);
    server
        .get("/api/campaigns")
        .add_header(h, v)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn google_sign_in_unavailable_without_credentials() {
    let (server, _pool) = setup().await;

    server
        .get("/api/auth/google")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn google_callback_rejects_unknown_state() {
    let (server, _pool) = setup().await;

    server
        .get("/api/auth/google/callback")
        .add_query_param("code", "abc")
        .add_query_param("state", "never-issued")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .get("/api/auth/google/callback")
        .add_query_param("error", "access_denied")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn client_config_is_public() {
    let (server, _pool) = setup().await;

    let res = server.get("/api/config").await;
    res.assert_status_ok();
    let body: Value = res.json();
    assert_eq!(body["appName"], "Tabletop");
    assert_eq!(body["googleEnabled"], false);
    assert_eq!(body["maxUploadBytes"], 64 * 1024);
}

#[tokio::test]
async fn google_profile_links_to_existing_email() {
    let pool = common::setup_test_db().await;
    let state = common::create_test_state(pool.clone());
    let (user_id, _) = common::create_test_user(&pool, "gm@example.com", "Gamemaster").await;

    let profile = tabletop_server::models::GoogleProfile {
        sub: "google-123".into(),
        email: "GM@example.com".into(),
        name: Some("GM on Google".into()),
        picture: None,
    };

    let linked = tabletop_server::routes::auth::link_google_account(&state, &profile)
        .await
        .unwrap();
    assert_eq!(linked, user_id);

    // Second sign-in resolves through the account row
    let again = tabletop_server::routes::auth::link_google_account(&state, &profile)
        .await
        .unwrap();
    assert_eq!(again, user_id);

    let accounts: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "account" WHERE user_id = ?"#)
        .bind(&user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(accounts, 2);
}

#[tokio::test]
async fn google_profile_creates_new_user() {
    let pool = common::setup_test_db().await;
    let state = common::create_test_state(pool.clone());

    let profile = tabletop_server::models::GoogleProfile {
        sub: "google-456".into(),
        email: "newcomer@example.com".into(),
        name: None,
        picture: Some("https://example.com/me.png".into()),
    };

    let user_id = tabletop_server::routes::auth::link_google_account(&state, &profile)
        .await
        .unwrap();

    let (name, image, hash): (String, Option<String>, Option<String>) = sqlx::query_as(
        r#"SELECT name, image, password_hash FROM "user" WHERE id = ?"#,
    )
    .bind(&user_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(name, "newcomer");
    assert_eq!(image.as_deref(), Some("https://example.com/me.png"));
    assert!(hash.is_none());
}
