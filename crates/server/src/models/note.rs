use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub campaign_id: String,
    pub created_by_id: String,
    pub title: String,
    pub content: String,
    pub gm_only: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, sqlx::FromRow)]
pub struct NoteRow {
    #[sqlx(flatten)]
    pub note: Note,
    pub creator_name: String,
    pub creator_email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteResponse {
    #[serde(flatten)]
    pub note: Note,
    pub created_by: NoteCreator,
}

#[derive(Debug, Serialize)]
pub struct NoteCreator {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl From<NoteRow> for NoteResponse {
    fn from(row: NoteRow) -> Self {
        Self {
            created_by: NoteCreator {
                id: row.note.created_by_id.clone(),
                name: row.creator_name,
                email: row.creator_email,
            },
            note: row.note,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub gm_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertNoteRequest {
    pub id: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub gm_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub gm_only: Option<bool>,
}

/// Body of the gm-only toggles. Kept loose so a non-boolean is a 400, not a 422.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmOnlyRequest {
    #[serde(default)]
    pub gm_only: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct NoteSearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NoteSearchResult {
    pub id: String,
    pub title: String,
    pub preview: String,
}
