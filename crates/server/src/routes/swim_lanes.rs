use axum::{
    Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use chrono::NaiveDate;
use db::models::{
    card::{CardWithAssignee, CreateCard},
    swim_lane::{SwimLane, UpdateSwimLane},
};
use remote::KanbanApi;
use serde::Deserialize;
use services::services::reconciler::{ReorderOutcome, position_between};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, routes::boards::OrderRequest};

#[derive(Debug, Deserialize, TS)]
pub struct MoveSwimLane {
    pub board_id: Uuid,
    /// Index in the board's lane order after the move.
    pub to_index: usize,
}

/// Card creation body; the lane comes from the path. Without a `position`
/// the card is appended.
#[derive(Debug, Deserialize, TS)]
pub struct NewCard {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub need_by_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub assigned_user_id: Option<Uuid>,
    #[serde(default)]
    pub position: Option<f64>,
}

/// PUT /api/swim-lanes/{lane_id}
pub async fn update_swim_lane(
    State(state): State<AppState>,
    Path(lane_id): Path<Uuid>,
    Json(payload): Json<UpdateSwimLane>,
) -> Result<ResponseJson<ApiResponse<SwimLane>>, ApiError> {
    let lane = state.backend().update_swim_lane(lane_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(lane)))
}

/// DELETE /api/swim-lanes/{lane_id}
pub async fn delete_swim_lane(
    State(state): State<AppState>,
    Path(lane_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.backend().delete_swim_lane(lane_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/swim-lanes/{lane_id}/move
pub async fn move_swim_lane(
    State(state): State<AppState>,
    Path(lane_id): Path<Uuid>,
    Json(payload): Json<MoveSwimLane>,
) -> Result<ResponseJson<ApiResponse<ReorderOutcome>>, ApiError> {
    let outcome = state
        .reconciler()
        .move_swim_lane(payload.board_id, lane_id, payload.to_index)
        .await?;
    Ok(ResponseJson(ApiResponse::success(outcome)))
}

/// GET /api/swim-lanes/{lane_id}/cards
pub async fn get_cards(
    State(state): State<AppState>,
    Path(lane_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<CardWithAssignee>>>, ApiError> {
    let cards = state.backend().get_cards_for_swim_lane(lane_id).await?;
    Ok(ResponseJson(ApiResponse::success(cards)))
}

/// POST /api/swim-lanes/{lane_id}/cards
pub async fn create_card(
    State(state): State<AppState>,
    Path(lane_id): Path<Uuid>,
    Json(payload): Json<NewCard>,
) -> Result<ResponseJson<ApiResponse<CardWithAssignee>>, ApiError> {
    let position = match payload.position {
        Some(position) => position,
        None => {
            let cards = state.backend().get_cards_for_swim_lane(lane_id).await?;
            let last = cards.iter().map(|c| c.position).reduce(f64::max);
            position_between(last, None).ok_or_else(|| {
                ApiError::BadRequest("No position left after the last card".into())
            })?
        }
    };

    let card = state
        .backend()
        .create_card(&CreateCard {
            title: payload.title,
            description: payload.description,
            need_by_date: payload.need_by_date,
            priority: payload.priority,
            assigned_user_id: payload.assigned_user_id,
            swim_lane_id: lane_id,
            position,
        })
        .await?;
    Ok(ResponseJson(ApiResponse::success(card)))
}

/// POST /api/swim-lanes/{lane_id}/cards/order
pub async fn order_cards(
    State(state): State<AppState>,
    Path(lane_id): Path<Uuid>,
    Json(payload): Json<OrderRequest>,
) -> Result<ResponseJson<ApiResponse<ReorderOutcome>>, ApiError> {
    let outcome = state
        .reconciler()
        .reorder_cards(lane_id, payload.order)
        .await?;
    Ok(ResponseJson(ApiResponse::success(outcome)))
}

pub fn router() -> Router<AppState> {
    let lane_router = Router::new()
        .route("/", put(update_swim_lane).delete(delete_swim_lane))
        .route("/move", post(move_swim_lane))
        .route("/cards", get(get_cards).post(create_card))
        .route("/cards/order", post(order_cards));

    Router::new().nest("/swim-lanes/{lane_id}", lane_router)
}
