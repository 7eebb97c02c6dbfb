mod members;

pub use members::*;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use sqlx::SqlitePool;
use std::sync::Arc;

use tabletop_shared::constants::ROLE_GM;
use tabletop_shared::validation::{validate_campaign_name, validate_description};

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AuthUser, CampaignListResponse, CampaignSummary, CampaignWithRole, CreateCampaignRequest,
    RoleResponse, UpdateCampaignRequest,
};
use crate::routes::files::remove_campaign_folder;
use crate::AppState;

/// Caller's role in the campaign, or `None` when they are not a member.
pub async fn member_role(
    db: &SqlitePool,
    campaign_id: &str,
    user_id: &str,
) -> ApiResult<Option<String>> {
    let role = sqlx::query_scalar::<_, String>(
        "SELECT role FROM campaign_members WHERE campaign_id = ? AND user_id = ?",
    )
    .bind(campaign_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(role)
}

/// Membership check for routes that hide the campaign from outsiders.
pub async fn require_member(
    db: &SqlitePool,
    campaign_id: &str,
    user_id: &str,
) -> ApiResult<String> {
    member_role(db, campaign_id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Campaign not found"))
}

/// GM check for management routes, which answer 401 to everyone else.
pub async fn require_gm(db: &SqlitePool, campaign_id: &str, user_id: &str) -> ApiResult<()> {
    match member_role(db, campaign_id, user_id).await?.as_deref() {
        Some(ROLE_GM) => Ok(()),
        _ => Err(ApiError::unauthorized()),
    }
}

/// GET /api/campaigns
pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<CampaignListResponse>> {
    let created_campaigns = sqlx::query_as::<_, CampaignSummary>(
        "SELECT id, name, description FROM campaigns WHERE created_by_id = ? ORDER BY created_at DESC",
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    let joined_campaigns = sqlx::query_as::<_, CampaignWithRole>(
        r#"SELECT c.id, c.name, c.description, m.role
           FROM campaign_members m
           INNER JOIN campaigns c ON c.id = m.campaign_id
           WHERE m.user_id = ? AND c.created_by_id != ?
           ORDER BY m.joined_at DESC"#,
    )
    .bind(&user.id)
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(CampaignListResponse {
        created_campaigns,
        joined_campaigns,
    }))
}

/// POST /api/campaigns
pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<CreateCampaignRequest>,
) -> ApiResult<Json<CampaignWithRole>> {
    let name = body.name.unwrap_or_default().trim().to_string();
    validate_campaign_name(&name).map_err(ApiError::BadRequest)?;

    let description = body
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    if let Some(ref d) = description {
        validate_description(d).map_err(ApiError::BadRequest)?;
    }

    let campaign_id = db::new_id();
    let now = db::now();

    // Creator becomes the first GM in the same transaction
    let mut tx = state.db.begin().await?;

    sqlx::query(
        "INSERT INTO campaigns (id, name, description, created_by_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&campaign_id)
    .bind(&name)
    .bind(&description)
    .bind(&user.id)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO campaign_members (id, campaign_id, user_id, role, joined_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(db::new_id())
    .bind(&campaign_id)
    .bind(&user.id)
    .bind(ROLE_GM)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!("Campaign {} created by {}", campaign_id, user.id);

    Ok(Json(CampaignWithRole {
        id: campaign_id,
        name,
        description,
        role: ROLE_GM.to_string(),
    }))
}

/// GET /api/campaigns/:campaignId
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(campaign_id): Path<String>,
) -> ApiResult<Json<CampaignWithRole>> {
    fetch_campaign_for(&state.db, &campaign_id, &user.id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Campaign not found"))
}

async fn fetch_campaign_for(
    db: &SqlitePool,
    campaign_id: &str,
    user_id: &str,
) -> ApiResult<Option<CampaignWithRole>> {
    let campaign = sqlx::query_as::<_, CampaignWithRole>(
        r#"SELECT c.id, c.name, c.description, m.role
           FROM campaigns c
           INNER JOIN campaign_members m ON m.campaign_id = c.id
           WHERE c.id = ? AND m.user_id = ?"#,
    )
    .bind(campaign_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(campaign)
}

/// PATCH /api/campaigns/:campaignId
pub async fn update_campaign(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(campaign_id): Path<String>,
    Json(body): Json<UpdateCampaignRequest>,
) -> ApiResult<Json<CampaignWithRole>> {
    require_gm(&state.db, &campaign_id, &user.id).await?;

    let name = body.name.map(|n| n.trim().to_string());
    if let Some(ref n) = name {
        validate_campaign_name(n).map_err(ApiError::BadRequest)?;
    }
    if let Some(ref d) = body.description {
        validate_description(d).map_err(ApiError::BadRequest)?;
    }

    sqlx::query(
        r#"UPDATE campaigns
           SET name = COALESCE(?, name), description = COALESCE(?, description), updated_at = ?
           WHERE id = ?"#,
    )
    .bind(&name)
    .bind(&body.description)
    .bind(db::now())
    .bind(&campaign_id)
    .execute(&state.db)
    .await?;

    fetch_campaign_for(&state.db, &campaign_id, &user.id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Campaign not found"))
}

/// DELETE /api/campaigns/:campaignId
pub async fn delete_campaign(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(campaign_id): Path<String>,
) -> ApiResult<StatusCode> {
    require_gm(&state.db, &campaign_id, &user.id).await?;

    // Drop the live board first so a pending save can't recreate the row
    state.whiteboard.discard_room(&campaign_id).await;

    sqlx::query("DELETE FROM campaigns WHERE id = ?")
        .bind(&campaign_id)
        .execute(&state.db)
        .await?;
    remove_campaign_folder(&state.config.upload_dir, &campaign_id).await;

    tracing::info!("Campaign {} deleted by {}", campaign_id, user.id);

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/campaigns/:campaignId/role
pub async fn get_role(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(campaign_id): Path<String>,
) -> ApiResult<Json<RoleResponse>> {
    let role = member_role(&state.db, &campaign_id, &user.id)
        .await?
        .ok_or_else(|| ApiError::forbidden("Not a member of this campaign"))?;
    Ok(Json(RoleResponse { role }))
}
