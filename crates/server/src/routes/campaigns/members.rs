use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use sqlx::SqlitePool;
use std::sync::Arc;

use tabletop_shared::constants::{ROLE_GM, ROLE_PLAYER};
use tabletop_shared::validation::validate_campaign_role;

use super::{require_gm, require_member};
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AddMemberRequest, AuthUser, MemberResponse, MemberRow, Player, UpdateMemberRoleRequest,
};
use crate::AppState;

const MEMBER_SELECT: &str = r#"SELECT m.id, m.campaign_id, m.user_id, m.role, m.joined_at,
       u.name AS user_name, u.email AS user_email, u.image AS user_image
   FROM campaign_members m
   INNER JOIN "user" u ON u.id = m.user_id"#;

async fn fetch_member(
    db: &SqlitePool,
    campaign_id: &str,
    member_id: &str,
) -> ApiResult<Option<MemberRow>> {
    let member = sqlx::query_as::<_, MemberRow>(&format!(
        "{} WHERE m.id = ? AND m.campaign_id = ?",
        MEMBER_SELECT
    ))
    .bind(member_id)
    .bind(campaign_id)
    .fetch_optional(db)
    .await?;
    Ok(member)
}

async fn gm_count(db: &SqlitePool, campaign_id: &str) -> ApiResult<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM campaign_members WHERE campaign_id = ? AND role = ?",
    )
    .bind(campaign_id)
    .bind(ROLE_GM)
    .fetch_one(db)
    .await?;
    Ok(count)
}

/// GET /api/campaigns/:campaignId/members
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(campaign_id): Path<String>,
) -> ApiResult<Json<Vec<MemberResponse>>> {
    require_member(&state.db, &campaign_id, &user.id).await?;

    let members = sqlx::query_as::<_, MemberRow>(&format!(
        "{} WHERE m.campaign_id = ? ORDER BY m.joined_at ASC",
        MEMBER_SELECT
    ))
    .bind(&campaign_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(members.into_iter().map(MemberResponse::from).collect()))
}

/// GET /api/campaigns/:campaignId/players
pub async fn list_players(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(campaign_id): Path<String>,
) -> ApiResult<Json<Vec<Player>>> {
    require_member(&state.db, &campaign_id, &user.id).await?;

    let players = sqlx::query_as::<_, Player>(
        r#"SELECT u.id, u.name, u.email, u.image, m.role
           FROM campaign_members m
           INNER JOIN "user" u ON u.id = m.user_id
           WHERE m.campaign_id = ?
           ORDER BY m.joined_at ASC"#,
    )
    .bind(&campaign_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(players))
}

/// POST /api/campaigns/:campaignId/members
pub async fn add_member(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(campaign_id): Path<String>,
    Json(body): Json<AddMemberRequest>,
) -> ApiResult<Json<MemberResponse>> {
    require_gm(&state.db, &campaign_id, &user.id).await?;

    let email = body.email.unwrap_or_default().trim().to_lowercase();
    if email.is_empty() {
        return Err(ApiError::bad_request("Email is required"));
    }

    let invitee = sqlx::query_scalar::<_, String>(r#"SELECT id FROM "user" WHERE email = ?"#)
        .bind(&email)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM campaign_members WHERE campaign_id = ? AND user_id = ?",
    )
    .bind(&campaign_id)
    .bind(&invitee)
    .fetch_one(&state.db)
    .await?;

    if existing > 0 {
        return Err(ApiError::bad_request("User is already a member of this campaign"));
    }

    let member_id = db::new_id();
    sqlx::query(
        "INSERT INTO campaign_members (id, campaign_id, user_id, role, joined_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&member_id)
    .bind(&campaign_id)
    .bind(&invitee)
    .bind(ROLE_PLAYER)
    .bind(db::now())
    .execute(&state.db)
    .await?;

    fetch_member(&state.db, &campaign_id, &member_id)
        .await?
        .map(|m| Json(m.into()))
        .ok_or_else(|| ApiError::internal("Member vanished after insert"))
}

/// PATCH /api/campaigns/:campaignId/members/:memberId
pub async fn update_member_role(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((campaign_id, member_id)): Path<(String, String)>,
    Json(body): Json<UpdateMemberRoleRequest>,
) -> ApiResult<Json<MemberResponse>> {
    require_gm(&state.db, &campaign_id, &user.id).await?;

    let role = body.role.unwrap_or_default();
    validate_campaign_role(&role).map_err(ApiError::BadRequest)?;

    let member = fetch_member(&state.db, &campaign_id, &member_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Member not found"))?;

    if member.role == ROLE_GM && role != ROLE_GM && gm_count(&state.db, &campaign_id).await? <= 1 {
        return Err(ApiError::bad_request("A campaign must keep at least one GM"));
    }

    sqlx::query("UPDATE campaign_members SET role = ? WHERE id = ?")
        .bind(&role)
        .bind(&member_id)
        .execute(&state.db)
        .await?;

    Ok(Json(MemberResponse::from(MemberRow { role, ..member })))
}

/// DELETE /api/campaigns/:campaignId/members/:memberId
pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((campaign_id, member_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    require_gm(&state.db, &campaign_id, &user.id).await?;

    let member = fetch_member(&state.db, &campaign_id, &member_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Member not found"))?;

    if member.role == ROLE_GM && gm_count(&state.db, &campaign_id).await? <= 1 {
        return Err(ApiError::bad_request("A campaign must keep at least one GM"));
    }

    sqlx::query("DELETE FROM campaign_members WHERE id = ?")
        .bind(&member_id)
        .execute(&state.db)
        .await?;

    state
        .whiteboard
        .kick_user(&campaign_id, &member.user_id)
        .await;

    Ok(StatusCode::NO_CONTENT)
}
