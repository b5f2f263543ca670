use axum::{
    Router,
    http::{Method, Request, header, header::HeaderName},
    middleware::from_fn_with_state,
    routing::get,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::{DefaultOnFailure, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, field};

use crate::{
    AppState,
    middleware::{require_page_session, require_session},
};

pub mod boards;
pub mod cards;
pub mod health;
pub mod pages;
pub mod positions;
pub mod session;
pub mod swim_lanes;

pub fn router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            let request_id = request
                .extensions()
                .get::<RequestId>()
                .and_then(|id| id.header_value().to_str().ok());
            let span = tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = field::Empty
            );
            if let Some(request_id) = request_id {
                span.record("request_id", field::display(request_id));
            }
            span
        })
        .on_response(DefaultOnResponse::new().level(Level::INFO))
        .on_failure(DefaultOnFailure::new().level(Level::ERROR));

    let api_public = Router::<AppState>::new()
        .route("/health", get(health::health_check))
        .merge(session::public_router());

    let api_protected = Router::<AppState>::new()
        .merge(session::protected_router())
        .merge(boards::router())
        .merge(swim_lanes::router())
        .merge(cards::router())
        .merge(positions::router())
        .layer(from_fn_with_state(state.clone(), require_session));

    let pages_protected = pages::protected_router().layer(from_fn_with_state(
        state.clone(),
        require_page_session,
    ));

    let mut app = Router::<AppState>::new()
        .nest("/api", api_public.merge(api_protected))
        .merge(pages::public_router())
        .merge(pages_protected)
        .fallback(pages::fallback);

    // The process acts as its signed-in user, so only a configured origin may call it
    if let Some(origin) = state.allowed_origin() {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list([origin.clone()]))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                ])
                .allow_headers([header::CONTENT_TYPE]),
        );
    }

    app.layer(trace_layer)
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            "x-request-id",
        )))
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static("x-request-id"),
            MakeRequestUuid {},
        ))
        .with_state(state)
}
