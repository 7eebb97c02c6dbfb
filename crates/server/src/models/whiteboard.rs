use serde::Serialize;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WhiteboardRow {
    pub campaign_id: String,
    pub document: String,
    pub version: i64,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhiteboardResponse {
    pub campaign_id: String,
    pub version: i64,
    pub document: serde_json::Value,
    pub updated_at: Option<String>,
}
