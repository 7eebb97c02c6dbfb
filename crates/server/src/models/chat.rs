use serde::{Deserialize, Serialize};

#[derive(Debug, sqlx::FromRow)]
pub struct ChatMessageRow {
    pub id: String,
    pub campaign_id: String,
    pub user_id: String,
    pub message: String,
    pub created_at: String,
    pub user_name: String,
    pub user_image: Option<String>,
}

/// `message` and `content` carry the same text; older clients read `message`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageResponse {
    pub id: String,
    pub campaign_id: String,
    pub user_id: String,
    pub message: String,
    pub content: String,
    pub created_at: String,
    pub user: ChatUser,
}

#[derive(Debug, Serialize)]
pub struct ChatUser {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
}

impl From<ChatMessageRow> for ChatMessageResponse {
    fn from(row: ChatMessageRow) -> Self {
        Self {
            user: ChatUser {
                id: row.user_id.clone(),
                name: row.user_name,
                image: row.user_image,
            },
            id: row.id,
            campaign_id: row.campaign_id,
            user_id: row.user_id,
            content: row.message.clone(),
            message: row.message,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub after: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RollRequest {
    pub formula: Option<String>,
}
