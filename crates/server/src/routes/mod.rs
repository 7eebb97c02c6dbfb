pub mod admin;
pub mod auth;
pub mod campaigns;
pub mod chat;
pub mod config;
pub mod dice;
pub mod files;
pub mod notes;
pub mod users;
pub mod whiteboard;

use crate::ws;
use crate::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post, put},
    Router,
};
use std::sync::Arc;

/// Headroom for multipart framing on top of the file size limit.
const MULTIPART_OVERHEAD_BYTES: usize = 1_048_576;

pub fn build_router(state: Arc<AppState>) -> Router {
    let upload_limit = usize::try_from(state.config.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/sign-in", post(auth::sign_in))
        .route("/sign-out", post(auth::sign_out))
        .route("/session", get(auth::get_session))
        .route("/google", get(auth::google_auth_url))
        .route("/google/callback", get(auth::google_callback));

    let upload_routes = Router::new()
        .route("/files/upload", post(files::upload_file))
        .route("/user/upload-image", post(users::upload_image))
        .layer(DefaultBodyLimit::max(upload_limit));

    let api_routes = Router::new()
        .route("/config", get(config::client_config))
        // Campaigns
        .route("/campaigns", get(campaigns::list_campaigns))
        .route("/campaigns", post(campaigns::create_campaign))
        .route("/campaigns/{campaignId}", get(campaigns::get_campaign))
        .route("/campaigns/{campaignId}", patch(campaigns::update_campaign))
        .route("/campaigns/{campaignId}", delete(campaigns::delete_campaign))
        .route("/campaigns/{campaignId}/role", get(campaigns::get_role))
        .route("/campaigns/{campaignId}/players", get(campaigns::list_players))
        .route("/campaigns/{campaignId}/members", get(campaigns::list_members))
        .route("/campaigns/{campaignId}/members", post(campaigns::add_member))
        .route("/campaigns/{campaignId}/members/{memberId}", patch(campaigns::update_member_role))
        .route("/campaigns/{campaignId}/members/{memberId}", delete(campaigns::remove_member))
        // Chat & dice
        .route("/chat/{campaignId}", get(chat::list_messages))
        .route("/chat/{campaignId}", post(chat::send_message))
        .route("/chat/{campaignId}/clear", post(chat::clear_messages))
        .route("/dice/roll", post(dice::roll))
        // Notes
        .route("/notes/{campaignId}", get(notes::list_notes))
        .route("/notes/{campaignId}", post(notes::create_note))
        .route("/notes/{campaignId}", put(notes::upsert_note))
        .route("/notes/{campaignId}/search", get(notes::search_notes))
        .route("/notes/{campaignId}/{noteId}", get(notes::get_note))
        .route("/notes/{campaignId}/{noteId}", patch(notes::update_note))
        .route("/notes/{campaignId}/{noteId}", delete(notes::delete_note))
        .route("/notes/{campaignId}/{noteId}/gm-only", patch(notes::set_note_gm_only))
        .route("/notes/{campaignId}/{noteId}/markdown", get(notes::export_markdown))
        // Files
        .route("/files", post(files::register_file))
        .route("/files/{campaignId}", get(files::list_files))
        .route("/files/{campaignId}/{fileId}", delete(files::delete_file))
        .route("/files/{campaignId}/{fileId}/gm-only", patch(files::set_file_gm_only))
        .route("/files/{campaignId}/{fileId}/rename", patch(files::rename_file))
        .route("/files/{campaignId}/{fileId}/download", get(files::download_file))
        // Users
        .route("/user/profile", put(users::update_profile))
        .route("/user/theme", get(users::get_theme))
        .route("/user/theme", patch(users::set_theme))
        .route("/user/{userId}", get(users::get_user))
        .route("/user/{userId}", patch(users::update_user))
        .route("/user/{userId}/image", post(users::set_user_image))
        // Admin
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users", patch(admin::update_user_role))
        .route("/admin/users", delete(admin::delete_user))
        // Whiteboard
        .route("/whiteboard/{campaignId}", get(whiteboard::get_whiteboard))
        .merge(upload_routes);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .route("/uploads/avatars/{name}", get(files::serve_avatar))
        .route("/uploads/{campaignId}/{name}", get(files::serve_upload))
        .route("/whiteboard/{campaignId}", get(ws::handler::whiteboard_ws))
        .with_state(state)
}
