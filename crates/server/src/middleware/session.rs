use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{AppState, error::ApiError};

/// JSON guard. Waits for the session store to settle, then either injects
/// the [`remote::Session`] into request extensions or answers 401.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let current = state.session().settled().await;
    let Some(session) = current.session().cloned() else {
        tracing::debug!(uri = %req.uri(), "Rejecting unauthenticated API request");
        return ApiError::Unauthorized.into_response();
    };
    req.extensions_mut().insert(session);
    next.run(req).await
}

/// Page guard: anonymous visitors are sent to `/login`.
pub async fn require_page_session(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if !state.session().settled().await.is_authenticated() {
        tracing::debug!(uri = %req.uri(), "Redirecting anonymous visitor to login");
        return Redirect::to("/login").into_response();
    }
    next.run(req).await
}
