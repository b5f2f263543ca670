use axum::{Json, Router, extract::State, response::Json as ResponseJson, routing::post};
use db::models::position::{PositionAck, PositionTable, PositionUpdate};
use serde::Deserialize;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize, TS)]
pub struct PositionBatch {
    pub table: PositionTable,
    pub items: Vec<PositionUpdate>,
}

/// POST /api/positions - one atomic batch; empty batches succeed without
/// touching the backend
pub async fn update_item_positions(
    State(state): State<AppState>,
    Json(payload): Json<PositionBatch>,
) -> Result<ResponseJson<ApiResponse<Vec<PositionAck>>>, ApiError> {
    let acks = state
        .reconciler()
        .update_item_positions(&payload.items, payload.table)
        .await?;
    Ok(ResponseJson(ApiResponse::success(acks)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/positions", post(update_item_positions))
}
