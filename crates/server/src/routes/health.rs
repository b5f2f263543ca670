use axum::{extract::State, response::Json};
use serde::Serialize;
use services::services::session::SessionPhase;
use utils::build_info::BUILD_INFO;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub git_commit: &'static str,
    pub build_timestamp: &'static str,
    pub session: SessionPhase,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: BUILD_INFO.version,
        git_commit: BUILD_INFO.git_commit,
        build_timestamp: BUILD_INFO.build_timestamp,
        session: state.session().state().phase(),
    })
}
