use axum::{
    Form, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use remote::{AuthError, Credentials, DataError, KanbanApi, SignUpCredentials};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    AppState,
    views::{Notice, pages},
};

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
}

/// GET /
pub async fn home(State(state): State<AppState>) -> Html<String> {
    Html(pages::home(&state.session().settled().await))
}

/// GET /login - signed-in visitors go straight to their boards
pub async fn login_page(State(state): State<AppState>) -> Response {
    let current = state.session().settled().await;
    if current.is_authenticated() {
        return Redirect::to("/boards").into_response();
    }
    Html(pages::login(&current, "", None)).into_response()
}

/// POST /login
pub async fn login(State(state): State<AppState>, Form(form): Form<Credentials>) -> Response {
    match state.session().login(&form).await {
        Ok(_) => Redirect::to("/boards").into_response(),
        Err(e) => {
            tracing::debug!(error = %e, "Sign-in failed");
            let status = match e {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                _ => StatusCode::BAD_GATEWAY,
            };
            let notice = Notice::Error(e.to_string());
            let html = pages::login(&state.session().state(), &form.email, Some(&notice));
            (status, Html(html)).into_response()
        }
    }
}

/// GET /register
pub async fn register_page(State(state): State<AppState>) -> Response {
    let current = state.session().settled().await;
    if current.is_authenticated() {
        return Redirect::to("/boards").into_response();
    }
    Html(pages::register(&current, "", "", None)).into_response()
}

/// POST /register
pub async fn register(State(state): State<AppState>, Form(form): Form<RegisterForm>) -> Response {
    let name = form.name.trim();
    let credentials = SignUpCredentials {
        email: form.email.clone(),
        password: form.password,
        name: (!name.is_empty()).then(|| name.to_string()),
    };

    match state.session().register(&credentials).await {
        Ok(outcome) if outcome.needs_confirmation() => {
            let notice = Notice::Info(format!(
                "Check {} for a confirmation link, then log in.",
                form.email
            ));
            Html(pages::login(&state.session().state(), &form.email, Some(&notice))).into_response()
        }
        Ok(_) => Redirect::to("/boards").into_response(),
        Err(e) => {
            tracing::debug!(error = %e, "Sign-up failed");
            let notice = Notice::Error(e.to_string());
            let html = pages::register(&state.session().state(), &form.email, name, Some(&notice));
            (StatusCode::UNPROCESSABLE_ENTITY, Html(html)).into_response()
        }
    }
}

/// POST /logout
pub async fn logout(State(state): State<AppState>) -> Redirect {
    if let Err(e) = state.session().logout().await {
        tracing::warn!(error = %e, "Remote sign-out failed; local session cleared anyway");
    }
    Redirect::to("/login")
}

/// GET /boards
pub async fn boards(State(state): State<AppState>) -> Response {
    let current = state.session().state();
    match state.backend().get_boards().await {
        Ok(boards) => Html(pages::boards(&current, &boards, None)).into_response(),
        // Session revoked after the guard let the request through
        Err(DataError::NotAuthenticated) => Redirect::to("/login").into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load boards");
            let notice = Notice::Error(format!("Could not load boards: {e}"));
            (
                StatusCode::BAD_GATEWAY,
                Html(pages::boards(&current, &[], Some(&notice))),
            )
                .into_response()
        }
    }
}

/// GET /boards/{board_id}
pub async fn board_detail(State(state): State<AppState>, Path(board_id): Path<Uuid>) -> Response {
    let current = state.session().state();
    match state.backend().get_board_by_id(board_id).await {
        Ok(board) => Html(pages::board_detail(&current, &board)).into_response(),
        Err(DataError::NotFound) => (
            StatusCode::NOT_FOUND,
            Html(pages::error(&current, "Board", "Board not found.")),
        )
            .into_response(),
        Err(DataError::NotAuthenticated) => Redirect::to("/login").into_response(),
        Err(e) => {
            tracing::warn!(board_id = %board_id, error = %e, "Failed to load board");
            (
                StatusCode::BAD_GATEWAY,
                Html(pages::error(&current, "Board", &format!("Could not load board: {e}"))),
            )
                .into_response()
        }
    }
}

/// Unknown paths go home.
pub async fn fallback() -> Redirect {
    Redirect::to("/")
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/login", get(login_page).post(login))
        .route("/register", get(register_page).post(register))
        .route("/logout", post(logout))
}

/// Pages behind the session guard.
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/boards", get(boards))
        .route("/boards/{board_id}", get(board_detail))
}
