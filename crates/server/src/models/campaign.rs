use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CampaignSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CampaignWithRole {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub role: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignListResponse {
    pub created_campaigns: Vec<CampaignSummary>,
    pub joined_campaigns: Vec<CampaignWithRole>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub role: String,
}

#[derive(Debug, sqlx::FromRow)]
pub struct MemberRow {
    pub id: String,
    pub campaign_id: String,
    pub user_id: String,
    pub role: String,
    pub joined_at: String,
    pub user_name: String,
    pub user_email: String,
    pub user_image: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    pub id: String,
    pub campaign_id: String,
    pub user_id: String,
    pub role: String,
    pub joined_at: String,
    pub user: MemberUser,
}

#[derive(Debug, Serialize)]
pub struct MemberUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
}

impl From<MemberRow> for MemberResponse {
    fn from(row: MemberRow) -> Self {
        Self {
            user: MemberUser {
                id: row.user_id.clone(),
                name: row.user_name,
                email: row.user_email,
                image: row.user_image,
            },
            id: row.id,
            campaign_id: row.campaign_id,
            user_id: row.user_id,
            role: row.role,
            joined_at: row.joined_at,
        }
    }
}

/// A campaign member flattened to the user, as the player picker shows it.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemberRoleRequest {
    pub role: Option<String>,
}
