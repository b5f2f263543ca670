use axum::{
    Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    card::{CardWithAssignee, UpdateCard},
    card_history::CardHistoryWithUser,
};
use remote::KanbanApi;
use serde::Deserialize;
use services::services::reconciler::ReorderOutcome;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize, TS)]
pub struct MoveCard {
    /// Destination lane; may equal the current one.
    pub swim_lane_id: Uuid,
    pub to_index: usize,
}

/// GET /api/cards/{card_id}
pub async fn get_card(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<CardWithAssignee>>, ApiError> {
    let card = state.backend().get_card_by_id(card_id).await?;
    Ok(ResponseJson(ApiResponse::success(card)))
}

/// PUT /api/cards/{card_id}
pub async fn update_card(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
    Json(payload): Json<UpdateCard>,
) -> Result<ResponseJson<ApiResponse<CardWithAssignee>>, ApiError> {
    let card = state.backend().update_card(card_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(card)))
}

/// DELETE /api/cards/{card_id}
pub async fn delete_card(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.backend().delete_card(card_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/cards/{card_id}/move
pub async fn move_card(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
    Json(payload): Json<MoveCard>,
) -> Result<ResponseJson<ApiResponse<ReorderOutcome>>, ApiError> {
    let outcome = state
        .reconciler()
        .move_card(card_id, payload.swim_lane_id, payload.to_index)
        .await?;
    Ok(ResponseJson(ApiResponse::success(outcome)))
}

/// GET /api/cards/{card_id}/history - newest first
pub async fn get_history(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<CardHistoryWithUser>>>, ApiError> {
    let history = state.backend().get_card_history(card_id).await?;
    Ok(ResponseJson(ApiResponse::success(history)))
}

pub fn router() -> Router<AppState> {
    let card_router = Router::new()
        .route("/", get(get_card).put(update_card).delete(delete_card))
        .route("/move", post(move_card))
        .route("/history", get(get_history));

    Router::new().nest("/cards/{card_id}", card_router)
}
