use sqlx::SqlitePool;

use super::Document;
use crate::db;

/// Stored board for a campaign; an empty document at version 0 if none yet.
pub async fn load_document(db: &SqlitePool, campaign_id: &str) -> Result<(Document, i64), sqlx::Error> {
    let row = sqlx::query_as::<_, (String, i64)>(
        "SELECT document, version FROM whiteboards WHERE campaign_id = ?",
    )
    .bind(campaign_id)
    .fetch_optional(db)
    .await?;

    Ok(match row {
        Some((document, version)) => {
            let document = serde_json::from_str::<Document>(&document).unwrap_or_else(|e| {
                tracing::warn!("Corrupt whiteboard document for {}: {}", campaign_id, e);
                Document::new()
            });
            (document, version)
        }
        None => (Document::new(), 0),
    })
}

/// Upsert a board. A snapshot older than the stored one is ignored.
pub async fn save_document(
    db: &SqlitePool,
    campaign_id: &str,
    document: &Document,
    version: i64,
) -> Result<(), sqlx::Error> {
    let json = serde_json::to_string(document).unwrap_or_else(|_| "{}".to_string());
    sqlx::query(
        r#"INSERT INTO whiteboards (campaign_id, document, version, updated_at)
           VALUES (?, ?, ?, ?)
           ON CONFLICT(campaign_id) DO UPDATE
           SET document = excluded.document, version = excluded.version, updated_at = excluded.updated_at
           WHERE excluded.version >= whiteboards.version"#,
    )
    .bind(campaign_id)
    .bind(&json)
    .bind(version)
    .bind(db::now())
    .execute(db)
    .await?;
    Ok(())
}
