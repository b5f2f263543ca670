use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::models::position::PositionFailure;
use remote::{AuthError, DataError};
use serde::Serialize;
use services::services::reconciler::ReorderError;
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Reorder(#[from] ReorderError),
    #[error("Not signed in")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
}

/// `error_data` of every failed JSON response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetails {
    /// Stable machine-readable error class.
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<PositionFailure>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub partial: bool,
}

impl ErrorDetails {
    fn kind(kind: &'static str) -> Self {
        Self {
            kind,
            failures: Vec::new(),
            partial: false,
        }
    }
}

impl ApiError {
    pub fn status_and_details(&self) -> (StatusCode, ErrorDetails) {
        match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, ErrorDetails::kind("unauthorized")),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, ErrorDetails::kind("bad_request")),
            ApiError::Auth(err) => match err {
                AuthError::InvalidCredentials => (
                    StatusCode::UNAUTHORIZED,
                    ErrorDetails::kind("invalid_credentials"),
                ),
                AuthError::SessionExpired | AuthError::NotAuthenticated => {
                    (StatusCode::UNAUTHORIZED, ErrorDetails::kind("unauthorized"))
                }
                AuthError::Rejected { .. } => {
                    (StatusCode::BAD_REQUEST, ErrorDetails::kind("auth_rejected"))
                }
                AuthError::Timeout => (StatusCode::GATEWAY_TIMEOUT, ErrorDetails::kind("timeout")),
                AuthError::Transport(_) | AuthError::Parse(_) => {
                    (StatusCode::BAD_GATEWAY, ErrorDetails::kind("upstream"))
                }
            },
            ApiError::Data(err) => data_status(err),
            ApiError::Reorder(err) => match err {
                ReorderError::UnknownItem(_) | ReorderError::IncompleteOrder => {
                    (StatusCode::BAD_REQUEST, ErrorDetails::kind("invalid_order"))
                }
                ReorderError::InvalidBatch(_) => {
                    (StatusCode::BAD_REQUEST, ErrorDetails::kind("invalid_batch"))
                }
                ReorderError::Rejected { failures, .. } => (
                    StatusCode::CONFLICT,
                    ErrorDetails {
                        kind: "reorder_rejected",
                        failures: failures.clone(),
                        partial: err.is_partial(),
                    },
                ),
                ReorderError::Conflict { failures, .. } => (
                    StatusCode::CONFLICT,
                    ErrorDetails {
                        kind: "reorder_conflict",
                        failures: failures.clone(),
                        partial: err.is_partial(),
                    },
                ),
                ReorderError::Data(inner) => data_status(inner),
            },
        }
    }
}

fn data_status(err: &DataError) -> (StatusCode, ErrorDetails) {
    match err {
        DataError::NotAuthenticated => {
            (StatusCode::UNAUTHORIZED, ErrorDetails::kind("unauthorized"))
        }
        DataError::NotFound => (StatusCode::NOT_FOUND, ErrorDetails::kind("not_found")),
        DataError::Forbidden(_) => (StatusCode::FORBIDDEN, ErrorDetails::kind("forbidden")),
        DataError::Validation(_) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorDetails::kind("validation"),
        ),
        DataError::Conflict(_) => (StatusCode::CONFLICT, ErrorDetails::kind("conflict")),
        DataError::BatchRejected { failures } => (
            StatusCode::CONFLICT,
            ErrorDetails {
                kind: "reorder_rejected",
                failures: failures.clone(),
                partial: false,
            },
        ),
        DataError::Timeout => (StatusCode::GATEWAY_TIMEOUT, ErrorDetails::kind("timeout")),
        DataError::Transport(_) | DataError::Parse(_) | DataError::Remote { .. } => {
            (StatusCode::BAD_GATEWAY, ErrorDetails::kind("upstream"))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, details) = self.status_and_details();
        if status.is_server_error() {
            tracing::error!(error = %self, kind = details.kind, "Request failed");
        } else {
            tracing::debug!(error = %self, kind = details.kind, "Request rejected");
        }
        let message = self.to_string();
        (
            status,
            Json(ApiResponse::<(), ErrorDetails>::error_with_data(&message, details)),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use db::models::position::FailureReason;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_partial_reorder_maps_to_conflict() {
        let err = ApiError::Reorder(ReorderError::Rejected {
            attempted: 2,
            failures: vec![PositionFailure {
                id: Uuid::nil(),
                reason: FailureReason::Forbidden,
            }],
        });
        let (status, details) = err.status_and_details();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(details.kind, "reorder_rejected");
        assert!(details.partial);
        assert_eq!(details.failures.len(), 1);
    }

    #[test]
    fn test_data_errors_keep_their_class() {
        let (status, details) = ApiError::Data(DataError::NotFound).status_and_details();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(details.kind, "not_found");

        let (status, _) =
            ApiError::Reorder(ReorderError::Data(DataError::Forbidden("rls".into())))
                .status_and_details();
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_bad_credentials_are_unauthorized() {
        let (status, details) =
            ApiError::Auth(AuthError::InvalidCredentials).status_and_details();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(details.kind, "invalid_credentials");
    }
}
