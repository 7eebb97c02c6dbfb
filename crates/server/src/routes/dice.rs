use axum::Json;
use serde::Serialize;

use crate::dice::{self, RollResult};
use crate::error::{ApiError, ApiResult};
use crate::models::{AuthUser, RollRequest};

#[derive(Debug, Serialize)]
pub struct RollPreview {
    #[serde(flatten)]
    pub result: RollResult,
    pub message: String,
}

/// POST /api/dice/roll
pub async fn roll(_user: AuthUser, Json(body): Json<RollRequest>) -> ApiResult<Json<RollPreview>> {
    let formula = body.formula.unwrap_or_default();
    if formula.trim().is_empty() {
        return Err(ApiError::bad_request("Formula is required"));
    }

    let parsed = dice::parse(&formula).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let result = parsed.roll(&mut rand::thread_rng());
    let message = result.to_message();

    Ok(Json(RollPreview { result, message }))
}
