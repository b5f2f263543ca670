use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use remote::{AuthProvider, Credentials, InMemoryBackend};
use serde_json::{Value, json};
use server::{AppState, routes};
use tower::ServiceExt;

const EMAIL: &str = "ada@example.com";
const PASSWORD: &str = "password1";

async fn app(backend: &InMemoryBackend) -> (Router, AppState) {
    let state = AppState::new(Arc::new(backend.clone()));
    state.session().start().await;
    state.session().settled().await;
    (routes::router(state.clone()), state)
}

async fn signed_in_app() -> (Router, AppState, InMemoryBackend) {
    let backend = InMemoryBackend::new();
    backend.register_user(EMAIL, PASSWORD, Some("Ada"));
    backend
        .sign_in(&Credentials {
            email: EMAIL.into(),
            password: PASSWORD.into(),
        })
        .await
        .unwrap();
    let (router, state) = app(&backend).await;
    (router, state, backend)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(body: Body) -> Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response.into_body()).await)
}

#[tokio::test]
async fn test_anonymous_boards_redirects_to_login() {
    let (app, _) = app(&InMemoryBackend::new()).await;

    let detail = format!("/boards/{}", uuid::Uuid::new_v4());
    for uri in ["/boards", detail.as_str()] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
    }
}

#[tokio::test]
async fn test_unknown_path_redirects_home() {
    let (app, _) = app(&InMemoryBackend::new()).await;
    let response = app.oneshot(get("/no/such/page")).await.unwrap();
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _) = app(&InMemoryBackend::new()).await;
    let response = app.oneshot(get("/api/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = body_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["session"], "anonymous");
}

#[tokio::test]
async fn test_api_requires_session() {
    let (app, _) = app(&InMemoryBackend::new()).await;
    let (status, body) = call(&app, get("/api/boards")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error_data"]["kind"], "unauthorized");
}

#[tokio::test]
async fn test_session_endpoint_reports_phase() {
    let (app, _, _) = signed_in_app().await;
    let (status, body) = call(&app, get("/api/session")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phase"], "authenticated");
    assert_eq!(body["data"]["display_name"], "Ada");
}

#[tokio::test]
async fn test_login_form_flow() {
    let backend = InMemoryBackend::new();
    backend.register_user(EMAIL, PASSWORD, Some("Ada"));
    let (app, state) = app(&backend).await;

    let response = app
        .clone()
        .oneshot(form("/login", "email=ada%40example.com&password=password1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/boards");
    assert!(state.session().state().is_authenticated());

    let response = app.clone().oneshot(get("/boards")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response.into_body()).await;
    assert!(html.contains("My Boards"));
    assert!(html.contains("Ada"));
    assert!(html.contains("Logout"));
}

#[tokio::test]
async fn test_login_with_bad_password_shows_banner() {
    let backend = InMemoryBackend::new();
    backend.register_user(EMAIL, PASSWORD, None);
    let (app, state) = app(&backend).await;

    let response = app
        .oneshot(form("/login", "email=ada%40example.com&password=wrong"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let html = body_text(response.into_body()).await;
    assert!(html.contains("banner-error"));
    assert!(html.contains(r#"value="ada@example.com""#));
    assert!(!state.session().state().is_authenticated());
}

#[tokio::test]
async fn test_register_pending_confirmation() {
    let backend = InMemoryBackend::new();
    backend.require_email_confirmation(true);
    let (app, _) = app(&backend).await;

    let response = app
        .oneshot(form(
            "/register",
            "email=grace%40example.com&password=password1&name=Grace",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response.into_body()).await;
    assert!(html.contains("confirmation link"));
}

#[tokio::test]
async fn test_home_and_logout() {
    let (app, state, _) = signed_in_app().await;

    let response = app.clone().oneshot(get("/")).await.unwrap();
    let html = body_text(response.into_body()).await;
    assert!(html.contains("Go to Your Boards"));

    let response = app.clone().oneshot(form("/logout", "")).await.unwrap();
    assert_eq!(location(&response), "/login");
    assert!(!state.session().state().is_authenticated());

    let response = app.oneshot(get("/")).await.unwrap();
    let html = body_text(response.into_body()).await;
    assert!(html.contains("Sign Up"));
}

#[tokio::test]
async fn test_board_lane_ordering_through_api() {
    let (app, _, _) = signed_in_app().await;

    let (status, body) = call(
        &app,
        json_request("POST", "/api/boards", json!({ "title": "Roadmap" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let board_id = body["data"]["id"].as_str().unwrap().to_string();

    let mut lanes = Vec::new();
    for title in ["L1", "L2"] {
        let (status, body) = call(
            &app,
            json_request(
                "POST",
                &format!("/api/boards/{board_id}/swim-lanes"),
                json!({ "title": title }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        lanes.push(body["data"]["id"].as_str().unwrap().to_string());
    }

    let (status, body) = call(
        &app,
        json_request(
            "POST",
            &format!("/api/swim-lanes/{}/move", lanes[1]),
            json!({ "board_id": board_id, "to_index": 0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order"], json!([lanes[1], lanes[0]]));

    let (_, body) = call(&app, get(&format!("/api/boards/{board_id}"))).await;
    let titles: Vec<&str> = body["data"]["swim_lanes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["L2", "L1"]);

    let response = app
        .oneshot(get(&format!("/boards/{board_id}")))
        .await
        .unwrap();
    let html = body_text(response.into_body()).await;
    let (l2, l1) = (html.find("L2").unwrap(), html.find("L1").unwrap());
    assert!(l2 < l1);
}

#[tokio::test]
async fn test_position_batch_endpoint() {
    let (app, _, backend) = signed_in_app().await;

    let (status, body) = call(
        &app,
        json_request("POST", "/api/positions", json!({ "table": "cards", "items": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));

    let id = uuid::Uuid::new_v4();
    let (status, body) = call(
        &app,
        json_request(
            "POST",
            "/api/positions",
            json!({
                "table": "swim_lanes",
                "items": [{ "id": id, "position": 1.0 }, { "id": id, "position": 2.0 }]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_data"]["kind"], "invalid_batch");
    assert_eq!(backend.position_batches(), 0);
}

#[tokio::test]
async fn test_rejected_batch_reports_failures() {
    let (app, _, backend) = signed_in_app().await;

    let (_, body) = call(
        &app,
        json_request("POST", "/api/boards", json!({ "title": "B" })),
    )
    .await;
    let board_id = body["data"]["id"].as_str().unwrap().to_string();

    let mut lanes = Vec::new();
    for title in ["A", "B"] {
        let (_, body) = call(
            &app,
            json_request(
                "POST",
                &format!("/api/boards/{board_id}/swim-lanes"),
                json!({ "title": title }),
            ),
        )
        .await;
        lanes.push(body["data"]["id"].as_str().unwrap().to_string());
    }
    backend.reject_positions_for(lanes[0].parse().unwrap());

    let (status, body) = call(
        &app,
        json_request(
            "POST",
            &format!("/api/boards/{board_id}/swim-lanes/order"),
            json!({ "order": [lanes[1], lanes[0]] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_data"]["kind"], "reorder_rejected");
    assert_eq!(body["error_data"]["partial"], true);
    assert_eq!(body["error_data"]["failures"][0]["id"], lanes[0]);
    assert_eq!(body["error_data"]["failures"][0]["reason"]["kind"], "forbidden");
}

#[tokio::test]
async fn test_card_move_and_history() {
    let (app, _, _) = signed_in_app().await;

    let (_, body) = call(
        &app,
        json_request("POST", "/api/boards", json!({ "title": "B" })),
    )
    .await;
    let board_id = body["data"]["id"].as_str().unwrap().to_string();

    let mut lanes = Vec::new();
    for title in ["Todo", "Done"] {
        let (_, body) = call(
            &app,
            json_request(
                "POST",
                &format!("/api/boards/{board_id}/swim-lanes"),
                json!({ "title": title }),
            ),
        )
        .await;
        lanes.push(body["data"]["id"].as_str().unwrap().to_string());
    }

    let (status, body) = call(
        &app,
        json_request(
            "POST",
            &format!("/api/swim-lanes/{}/cards", lanes[0]),
            json!({ "title": "Write docs", "priority": 2 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["position"], 1.0);
    let card_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = call(
        &app,
        json_request(
            "POST",
            &format!("/api/cards/{card_id}/move"),
            json!({ "swim_lane_id": lanes[1], "to_index": 0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&app, get(&format!("/api/cards/{card_id}"))).await;
    assert_eq!(body["data"]["swim_lane_id"], lanes[1]);

    let (_, body) = call(&app, get(&format!("/api/cards/{card_id}/history"))).await;
    let actions: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["change"]["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["moved", "created"]);
}

#[tokio::test]
async fn test_missing_board_is_not_found() {
    let (app, _, _) = signed_in_app().await;
    let (status, body) = call(
        &app,
        get(&format!("/api/boards/{}", uuid::Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_data"]["kind"], "not_found");
}

fn from_origin(uri: &str, origin: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::ORIGIN, origin)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_cross_origin_calls_are_not_allowed_by_default() {
    let (app, _, _) = signed_in_app().await;
    let response = app
        .oneshot(from_origin("/api/boards", "https://evil.example"))
        .await
        .unwrap();

    assert!(
        !response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
    );
}

#[tokio::test]
async fn test_only_the_configured_origin_is_allowed() {
    let backend = InMemoryBackend::new();
    backend.register_user(EMAIL, PASSWORD, Some("Ada"));
    let state = AppState::new(Arc::new(backend.clone()))
        .with_allowed_origin(HeaderValue::from_static("http://localhost:5173"));
    state
        .session()
        .login(&Credentials {
            email: EMAIL.into(),
            password: PASSWORD.into(),
        })
        .await
        .unwrap();
    let app = routes::router(state);

    let response = app
        .clone()
        .oneshot(from_origin("/api/boards", "http://localhost:5173"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
        Some(&HeaderValue::from_static("http://localhost:5173"))
    );

    let response = app
        .oneshot(from_origin("/api/boards", "https://evil.example"))
        .await
        .unwrap();
    assert!(
        !response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
    );
}

#[tokio::test]
async fn test_revoked_session_redirects_board_pages_to_login() {
    let backend = InMemoryBackend::new();
    backend.register_user(EMAIL, PASSWORD, Some("Ada"));
    // No event loop, so the store keeps its signed-in state after the
    // backend drops the session
    let state = AppState::new(Arc::new(backend.clone()));
    state
        .session()
        .login(&Credentials {
            email: EMAIL.into(),
            password: PASSWORD.into(),
        })
        .await
        .unwrap();
    backend.sign_out().await.unwrap();
    assert!(state.session().state().is_authenticated());
    let app = routes::router(state);

    let detail = format!("/boards/{}", uuid::Uuid::new_v4());
    for uri in ["/boards", detail.as_str()] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
    }
}

#[tokio::test]
async fn test_create_then_delete_board() {
    let (app, _, backend) = signed_in_app().await;
    let (status, body) = call(
        &app,
        json_request("POST", "/api/boards", json!({ "title": "Scratch" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let uri = format!("/api/boards/{}", body["data"]["id"].as_str().unwrap());

    let delete = Request::builder()
        .method("DELETE")
        .uri(&uri)
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(&app, delete).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(backend.member_count(), 0);

    let (status, _) = call(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
