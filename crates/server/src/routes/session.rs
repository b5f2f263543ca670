use axum::{
    Extension, Json, Router,
    extract::State,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::user::{UpdateUserProfile, UserProfile};
use remote::{AuthUser, KanbanApi, Session};
use serde::Serialize;
use services::services::session::{SessionPhase, SessionState};
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub phase: SessionPhase,
    pub user: Option<AuthUser>,
    pub profile: Option<UserProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_error: Option<String>,
    pub display_name: Option<String>,
}

/// GET /api/session
pub async fn get_session(State(state): State<AppState>) -> ResponseJson<ApiResponse<SessionView>> {
    let current = state.session().state();
    let profile_error = match &current {
        SessionState::Authenticated { profile_error, .. } => {
            profile_error.clone()
        }
        _ => None,
    };
    ResponseJson(ApiResponse::success(SessionView {
        phase: current.phase(),
        user: current.session().map(|s| s.user.clone()),
        profile: current.profile().cloned(),
        profile_error,
        display_name: current.display_name(),
    }))
}

/// GET /api/profile
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<ResponseJson<ApiResponse<UserProfile>>, ApiError> {
    let profile = state.backend().get_user_profile(session.user_id()).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

/// PUT /api/profile
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<UpdateUserProfile>,
) -> Result<ResponseJson<ApiResponse<UserProfile>>, ApiError> {
    if payload.is_empty() {
        return Err(ApiError::BadRequest("Nothing to update".into()));
    }
    let profile = state
        .backend()
        .update_user_profile(session.user_id(), &payload)
        .await?;

    if let Err(e) = state.session().refresh_profile().await {
        tracing::warn!(error = %e, "Profile updated but session copy could not be refreshed");
    }
    Ok(ResponseJson(ApiResponse::success(profile)))
}

/// Reachable while signed out so clients can learn the phase.
pub fn public_router() -> Router<AppState> {
    Router::new().route("/session", get(get_session))
}

pub fn protected_router() -> Router<AppState> {
    Router::new().route("/profile", get(get_profile).put(update_profile))
}
