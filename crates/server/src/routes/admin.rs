use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use tabletop_shared::validation::validate_user_role;

use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::AdminUser;
use crate::models::{AdminDeleteUserRequest, AdminUpdateRoleRequest, UserAccount};
use crate::routes::files::remove_campaign_folder;
use crate::routes::users::remove_own_avatar;
use crate::AppState;

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<UserAccount>>> {
    let users = sqlx::query_as::<_, UserAccount>(
        r#"SELECT id, name, email, role, image FROM "user" ORDER BY created_at ASC"#,
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(users))
}

/// PATCH /api/admin/users
pub async fn update_user_role(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(body): Json<AdminUpdateRoleRequest>,
) -> ApiResult<Json<UserAccount>> {
    let (user_id, role) = match (body.user_id, body.role) {
        (Some(u), Some(r)) if !u.is_empty() => (u, r),
        _ => return Err(ApiError::bad_request("Invalid request")),
    };
    validate_user_role(&role).map_err(ApiError::BadRequest)?;

    let result = sqlx::query(r#"UPDATE "user" SET role = ?, updated_at = ? WHERE id = ?"#)
        .bind(&role)
        .bind(crate::db::now())
        .bind(&user_id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!("Admin {} set role of {} to {}", admin.id, user_id, role);

    let user = sqlx::query_as::<_, UserAccount>(
        r#"SELECT id, name, email, role, image FROM "user" WHERE id = ?"#,
    )
    .bind(&user_id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(user))
}

/// DELETE /api/admin/users
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(body): Json<AdminDeleteUserRequest>,
) -> ApiResult<StatusCode> {
    let user_id = body
        .user_id
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::bad_request("Invalid request"))?;

    if user_id == admin.id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    // Campaigns they created go with them; close any live boards first
    let owned = sqlx::query_scalar::<_, String>("SELECT id FROM campaigns WHERE created_by_id = ?")
        .bind(&user_id)
        .fetch_all(&state.db)
        .await?;
    for campaign_id in &owned {
        state.whiteboard.discard_room(campaign_id).await;
    }
    let image = sqlx::query_scalar::<_, Option<String>>(r#"SELECT image FROM "user" WHERE id = ?"#)
        .bind(&user_id)
        .fetch_optional(&state.db)
        .await?
        .flatten();

    let result = sqlx::query(r#"DELETE FROM "user" WHERE id = ?"#)
        .bind(&user_id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    state.whiteboard.kick_user_everywhere(&user_id).await;
    for campaign_id in &owned {
        remove_campaign_folder(&state.config.upload_dir, campaign_id).await;
    }
    if let Some(image) = image {
        remove_own_avatar(&state, &user_id, &image).await?;
    }

    tracing::info!(
        "Admin {} deleted user {} ({} campaigns)",
        admin.id,
        user_id,
        owned.len()
    );

    Ok(StatusCode::NO_CONTENT)
}
