mod common;

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::{json, Value};

async fn setup() -> (TestServer, sqlx::SqlitePool) {
    let pool = common::setup_test_db().await;
    let app = common::create_test_app(pool.clone());
    (TestServer::new(app).unwrap(), pool)
}

#[tokio::test]
async fn get_user_profile() {
    let (server, pool) = setup().await;
    let (user_id, token) = common::create_test_user(&pool, "gm@example.com", "GM").await;

    let (h, v) = common::auth_header(&token);
    let res = server.get(&format!("/api/user/{}", user_id)).add_header(h, v).await;
    res.assert_status_ok();
    let body: Value = res.json();
    assert_eq!(body["name"], "GM");
    assert!(body["bio"].is_null());

    let (h, v) = common::auth_header(&token);
    server
        .get("/api/user/does-not-exist")
        .add_header(h, v)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_own_profile_only() {
    let (server, pool) = setup().await;
    let (user_id, token) = common::create_test_user(&pool, "gm@example.com", "GM").await;
    let (other_id, _) = common::create_test_user(&pool, "o@example.com", "Other").await;

    let (h, v) = common::auth_header(&token);
    server
        .patch(&format!("/api/user/{}", other_id))
        .add_header(h, v)
        .json(&json!({ "name": "Renamed" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let (h, v) = common::auth_header(&token);
    let res = server
        .patch(&format!("/api/user/{}", user_id))
        .add_header(h, v)
        .json(&json!({ "name": "Dungeon Master", "bio": "Runs Tuesday games" }))
        .await;
    res.assert_status_ok();
    let body: Value = res.json();
    assert_eq!(body["name"], "Dungeon Master");
    assert_eq!(body["bio"], "Runs Tuesday games");
    assert_eq!(body["email"], "gm@example.com");
}

#[tokio::test]
async fn update_email_conflict() {
    let (server, pool) = setup().await;
    let (user_id, token) = common::create_test_user(&pool, "gm@example.com", "GM").await;
    common::create_test_user(&pool, "taken@example.com", "Taken").await;

    let (h, v) = common::auth_header(&token);
    server
        .patch(&format!("/api/user/{}", user_id))
        .add_header(h, v)
        .json(&json!({ "email": "TAKEN@example.com" }))
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn set_image_url() {
    let (server, pool) = setup().await;
    let (user_id, token) = common::create_test_user(&pool, "gm@example.com", "GM").await;
    let (other_id, _) = common::create_test_user(&pool, "o@example.com", "Other").await;

    let (h, v) = common::auth_header(&token);
    server
        .post(&format!("/api/user/{}/image", other_id))
        .add_header(h, v)
        .json(&json!({ "image": "https://example.com/a.png" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let (h, v) = common::auth_header(&token);
    let res = server
        .post(&format!("/api/user/{}/image", user_id))
        .add_header(h, v)
        .json(&json!({ "image": "https://example.com/a.png" }))
        .await;
    res.assert_status_ok();
    assert_eq!(res.json::<Value>()["image"], "https://example.com/a.png");
}

#[tokio::test]
async fn profile_password_change_allows_new_sign_in() {
    let (server, pool) = setup().await;
    let (_id, token) = common::create_test_user(&pool, "gm@example.com", "GM").await;

    let (h, v) = common::auth_header(&token);
    server
        .put("/api/user/profile")
        .add_header(h, v)
        .json(&json!({ "newPassword": "short" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let (h, v) = common::auth_header(&token);
    let res = server
        .put("/api/user/profile")
        .add_header(h, v)
        .json(&json!({ "bio": "New bio", "newPassword": "a-much-better-one" }))
        .await;
    res.assert_status_ok();
    assert_eq!(res.json::<Value>()["bio"], "New bio");

    server
        .post("/api/auth/sign-in")
        .json(&json!({ "email": "gm@example.com", "password": "password123" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .post("/api/auth/sign-in")
        .json(&json!({ "email": "gm@example.com", "password": "a-much-better-one" }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn upload_avatar_and_serve_publicly() {
    let (server, pool) = setup().await;
    let (_id, token) = common::create_test_user(&pool, "gm@example.com", "GM").await;

    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"avatar bytes".to_vec())
            .file_name("me.PNG")
            .mime_type("image/png"),
    );
    let (h, v) = common::auth_header(&token);
    let res = server
        .post("/api/user/upload-image")
        .add_header(h, v)
        .multipart(form)
        .await;
    res.assert_status_ok();
    let image_url = res.json::<Value>()["imageUrl"].as_str().unwrap().to_string();
    assert!(image_url.starts_with("/uploads/avatars/"));
    assert!(image_url.ends_with(".png"));

    let res = server.get(&image_url).await;
    res.assert_status_ok();
    assert_eq!(res.as_bytes().as_ref(), b"avatar bytes");

    // Replacing the avatar removes the old one
    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"second".to_vec()).file_name("me2.png").mime_type("image/png"),
    );
    let (h, v) = common::auth_header(&token);
    server
        .post("/api/user/upload-image")
        .add_header(h, v)
        .multipart(form)
        .await
        .assert_status_ok();

    server
        .get(&image_url)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_avatar_rejects_non_images() {
    let (server, pool) = setup().await;
    let (_id, token) = common::create_test_user(&pool, "gm@example.com", "GM").await;

    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"%PDF".to_vec()).file_name("doc.pdf").mime_type("application/pdf"),
    );
    let (h, v) = common::auth_header(&token);
    server
        .post("/api/user/upload-image")
        .add_header(h, v)
        .multipart(form)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn theme_round_trip() {
    let (server, pool) = setup().await;
    let (_id, token) = common::create_test_user(&pool, "gm@example.com", "GM").await;

    let (h, v) = common::auth_header(&token);
    let res = server.get("/api/user/theme").add_header(h, v).await;
    res.assert_status_ok();
    assert_eq!(res.json::<Value>()["theme"], "system");

    let (h, v) = common::auth_header(&token);
    server
        .patch("/api/user/theme")
        .add_header(h, v)
        .json(&json!({ "theme": "neon" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let (h, v) = common::auth_header(&token);
    server
        .patch("/api/user/theme")
        .add_header(h, v)
        .json(&json!({ "theme": "dark" }))
        .await
        .assert_status_ok();

    let (h, v) = common::auth_header(&token);
    let res = server.get("/api/user/theme").add_header(h, v).await;
    assert_eq!(res.json::<Value>()["theme"], "dark");
}

async fn upload_avatar(server: &TestServer, token: &str, data: &[u8]) -> String {
    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(data.to_vec()).file_name("me.png").mime_type("image/png"),
    );
    let (h, v) = common::auth_header(token);
    let res = server
        .post("/api/user/upload-image")
        .add_header(h, v)
        .multipart(form)
        .await;
    res.assert_status_ok();
    res.json::<Value>()["imageUrl"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn replacing_avatar_leaves_other_users_avatars_alone() {
    let (server, pool) = setup().await;
    let (_victim_id, victim) = common::create_test_user(&pool, "v@example.com", "Victim").await;
    let (borrower_id, borrower) = common::create_test_user(&pool, "b@example.com", "Borrower").await;

    let victim_url = upload_avatar(&server, &victim, b"victim face").await;

    let (h, v) = common::auth_header(&borrower);
    server
        .post(&format!("/api/user/{}/image", borrower_id))
        .add_header(h, v)
        .json(&json!({ "image": victim_url }))
        .await
        .assert_status_ok();

    upload_avatar(&server, &borrower, b"borrower face").await;

    let res = server.get(&victim_url).await;
    res.assert_status_ok();
    assert_eq!(res.as_bytes().as_ref(), b"victim face");
}
