use axum::{
    Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, patch, post},
};
use db::models::{
    board::{Board, BoardDetail, BoardSummary, CreateBoard, UpdateBoard},
    board_member::{AddBoardMember, BoardMember, UpdateMemberRole},
    swim_lane::{CreateSwimLane, SwimLane},
};
use remote::KanbanApi;
use serde::Deserialize;
use services::services::reconciler::{ReorderOutcome, position_between};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// Lane creation body; the board comes from the path. Without a
/// `position` the lane is appended after the last one.
#[derive(Debug, Deserialize, TS)]
pub struct NewSwimLane {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub position: Option<f64>,
}

#[derive(Debug, Deserialize, TS)]
pub struct OrderRequest {
    /// Every sibling id, in the desired order.
    pub order: Vec<Uuid>,
}

/// GET /api/boards
pub async fn get_boards(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<BoardSummary>>>, ApiError> {
    let boards = state.backend().get_boards().await?;
    Ok(ResponseJson(ApiResponse::success(boards)))
}

/// POST /api/boards
pub async fn create_board(
    State(state): State<AppState>,
    Json(payload): Json<CreateBoard>,
) -> Result<ResponseJson<ApiResponse<Board>>, ApiError> {
    let board = state.backend().create_board(&payload).await?;
    tracing::info!(board_id = %board.id, "Created board");
    Ok(ResponseJson(ApiResponse::success(board)))
}

/// GET /api/boards/{board_id} - lanes and cards ordered by position
pub async fn get_board(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<BoardDetail>>, ApiError> {
    let board = state.backend().get_board_by_id(board_id).await?;
    Ok(ResponseJson(ApiResponse::success(board)))
}

/// PUT /api/boards/{board_id}
pub async fn update_board(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Json(payload): Json<UpdateBoard>,
) -> Result<ResponseJson<ApiResponse<Board>>, ApiError> {
    let board = state.backend().update_board(board_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(board)))
}

/// DELETE /api/boards/{board_id} - cascades to lanes, cards, members and history
pub async fn delete_board(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.backend().delete_board(board_id).await?;
    tracing::info!(board_id = %board_id, "Deleted board");
    Ok(ResponseJson(ApiResponse::success(())))
}

/// GET /api/boards/{board_id}/swim-lanes
pub async fn get_swim_lanes(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<SwimLane>>>, ApiError> {
    let lanes = state.backend().get_swim_lanes_for_board(board_id).await?;
    Ok(ResponseJson(ApiResponse::success(lanes)))
}

/// POST /api/boards/{board_id}/swim-lanes
pub async fn create_swim_lane(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Json(payload): Json<NewSwimLane>,
) -> Result<ResponseJson<ApiResponse<SwimLane>>, ApiError> {
    let position = match payload.position {
        Some(position) => position,
        None => {
            let lanes = state.backend().get_swim_lanes_for_board(board_id).await?;
            let last = lanes.iter().map(|l| l.position).reduce(f64::max);
            position_between(last, None).ok_or_else(|| {
                ApiError::BadRequest("No position left after the last lane".into())
            })?
        }
    };

    let lane = state
        .backend()
        .create_swim_lane(&CreateSwimLane {
            title: payload.title,
            description: payload.description,
            position,
            board_id,
        })
        .await?;
    Ok(ResponseJson(ApiResponse::success(lane)))
}

/// POST /api/boards/{board_id}/swim-lanes/order
pub async fn order_swim_lanes(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Json(payload): Json<OrderRequest>,
) -> Result<ResponseJson<ApiResponse<ReorderOutcome>>, ApiError> {
    let outcome = state
        .reconciler()
        .reorder_swim_lanes(board_id, payload.order)
        .await?;
    Ok(ResponseJson(ApiResponse::success(outcome)))
}

/// POST /api/boards/{board_id}/members
pub async fn add_member(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Json(payload): Json<AddBoardMember>,
) -> Result<ResponseJson<ApiResponse<BoardMember>>, ApiError> {
    let member = state
        .backend()
        .add_board_member(board_id, payload.user_id, payload.role)
        .await?;
    tracing::info!(board_id = %board_id, user_id = %member.user_id, role = %member.role, "Added board member");
    Ok(ResponseJson(ApiResponse::success(member)))
}

/// PATCH /api/boards/{board_id}/members/{user_id}
pub async fn update_member_role(
    State(state): State<AppState>,
    Path((board_id, user_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateMemberRole>,
) -> Result<ResponseJson<ApiResponse<BoardMember>>, ApiError> {
    let member = state
        .backend()
        .update_board_member_role(board_id, user_id, payload.role)
        .await?;
    Ok(ResponseJson(ApiResponse::success(member)))
}

/// DELETE /api/boards/{board_id}/members/{user_id}
pub async fn remove_member(
    State(state): State<AppState>,
    Path((board_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state
        .backend()
        .remove_board_member(board_id, user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    let board_router = Router::new()
        .route("/", get(get_board).put(update_board).delete(delete_board))
        .route("/swim-lanes", get(get_swim_lanes).post(create_swim_lane))
        .route("/swim-lanes/order", post(order_swim_lanes))
        .route("/members", post(add_member))
        .route(
            "/members/{user_id}",
            patch(update_member_role).delete(remove_member),
        );

    let inner = Router::new()
        .route("/", get(get_boards).post(create_board))
        .nest("/{board_id}", board_router);

    Router::new().nest("/boards", inner)
}
