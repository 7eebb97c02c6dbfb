use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CampaignFile {
    pub id: String,
    pub campaign_id: String,
    pub uploaded_by_id: String,
    pub name: String,
    pub url: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub file_type: String,
    pub size: i64,
    pub gm_only: bool,
    pub uploaded_at: String,
}

#[derive(Debug, sqlx::FromRow)]
pub struct FileRow {
    #[sqlx(flatten)]
    pub file: CampaignFile,
    pub uploader_name: String,
    pub uploader_image: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    #[serde(flatten)]
    pub file: CampaignFile,
    pub uploaded_by: FileUploader,
}

#[derive(Debug, Serialize)]
pub struct FileUploader {
    pub name: String,
    pub image: Option<String>,
}

impl From<FileRow> for FileResponse {
    fn from(row: FileRow) -> Self {
        Self {
            file: row.file,
            uploaded_by: FileUploader {
                name: row.uploader_name,
                image: row.uploader_image,
            },
        }
    }
}

/// Metadata for a file already stored by the hosted file service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterFileRequest {
    pub campaign_id: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub file_type: Option<String>,
    pub size: Option<i64>,
    pub gm_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct RenameFileRequest {
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub url: String,
}
