//! Privet client against an in-process fake device

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use logocert_core::CertError;
use logocert_privet::{PrivetClient, PrivetDevice, RegisterAction};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const TOKEN: &str = "AIp06DjQd80yMoGYuGmT_VDAApuBZbInsQ:1358377509659";

#[derive(Default)]
struct FakeDevice {
    registered_user: Option<String>,
    claim_polls: usize,
    submitted: Vec<(Option<String>, usize, String)>,
    /// Bumped whenever the device issues a fresh token
    token_generation: usize,
    info_requests: usize,
    tickets: Vec<serde_json::Value>,
}

impl FakeDevice {
    fn token(&self) -> String {
        match self.token_generation {
            0 => TOKEN.to_string(),
            n => format!("{}-{}", TOKEN, n),
        }
    }

    fn rotate_token(&mut self) {
        self.token_generation += 1;
    }
}

type Shared = Arc<Mutex<FakeDevice>>;

fn token_error() -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_x_privet_token"}))).into_response()
}

fn has_token(state: &Shared, headers: &HeaderMap) -> bool {
    let current = state.lock().unwrap().token();
    headers.get("x-privet-token").and_then(|v| v.to_str().ok()) == Some(current.as_str())
}

async fn info(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if !headers.contains_key("x-privet-token") {
        return token_error();
    }
    let mut state = state.lock().unwrap();
    state.info_requests += 1;
    let id = if state.registered_user.is_some() { "device-42" } else { "" };
    let token = state.token();
    Json(json!({
        "version": "1.0",
        "name": "Acme LaserJet",
        "url": "https://www.google.com/cloudprint",
        "type": ["printer"],
        "id": id,
        "device_state": "idle",
        "connection_state": "online",
        "x-privet-token": token,
        "api": [
            "/privet/accesstoken",
            "/privet/capabilities",
            "/privet/printer/createjob",
            "/privet/printer/submitdoc",
            "/privet/register"
        ]
    }))
    .into_response()
}

async fn register(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !has_token(&state, &headers) {
        return token_error();
    }
    let mut state = state.lock().unwrap();
    let action = query.get("action").cloned().unwrap_or_default();
    let user = query.get("user").cloned().unwrap_or_default();
    match action.as_str() {
        "start" => Json(json!({"action": "start", "user": user})).into_response(),
        "getClaimToken" => {
            state.claim_polls += 1;
            if state.claim_polls < 2 {
                return Json(json!({"error": "pending_user_action", "timeout": 1})).into_response();
            }
            Json(json!({
                "action": "getClaimToken",
                "user": user,
                "token": "claim-abc",
                "claim_url": "https://www.google.com/cloudprint/claimprinter.html?token=claim-abc"
            }))
            .into_response()
        }
        "complete" => {
            state.registered_user = Some(user.clone());
            Json(json!({"action": "complete", "user": user, "device_id": "device-42"})).into_response()
        }
        "cancel" => Json(json!({"action": "cancel", "user": user})).into_response(),
        _ => (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_action"}))).into_response(),
    }
}

async fn access_token(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if !has_token(&state, &headers) {
        return token_error();
    }
    if !headers.contains_key("authorization") {
        return (StatusCode::FORBIDDEN, Json(json!({"error": "invalid_auth"}))).into_response();
    }
    Json(json!({"access_token": "local", "expires_in": 600})).into_response()
}

async fn capabilities(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if !has_token(&state, &headers) {
        return token_error();
    }
    Json(json!({"version": "1.0", "printer": {"supported_content_type": [{"content_type": "application/pdf"}]}}))
        .into_response()
}

async fn submitdoc(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    if !has_token(&state, &headers) {
        return token_error();
    }
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let mut state = state.lock().unwrap();
    state.submitted.push((query.get("job_id").cloned(), body.len(), content_type));
    Json(json!({"job_id": "local-1", "expires_in": 500})).into_response()
}

async fn createjob(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(ticket): Json<serde_json::Value>,
) -> Response {
    if !has_token(&state, &headers) {
        return token_error();
    }
    let mut state = state.lock().unwrap();
    state.tickets.push(ticket);
    let job_id = format!("local-{}", state.tickets.len());
    Json(json!({"job_id": job_id, "expires_in": 500})).into_response()
}

async fn start_fake(state: Shared) -> String {
    let app = Router::new()
        .route("/privet/info", get(info))
        .route("/privet/register", post(register))
        .route("/privet/accesstoken", get(access_token))
        .route("/privet/capabilities", get(capabilities))
        .route("/privet/printer/createjob", post(createjob))
        .route("/privet/printer/submitdoc", post(submitdoc))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn setup() -> (PrivetClient, Shared) {
    let state: Shared = Arc::default();
    let base = start_fake(state.clone()).await;
    (PrivetClient::new(base).unwrap(), state)
}

#[tokio::test]
async fn test_info_uses_empty_token() {
    let (client, _) = setup().await;
    let info = client.info().await.unwrap();
    assert_eq!(info.name, "Acme LaserJet");
    assert_eq!(info.x_privet_token, TOKEN);
    assert!(info.missing_required().is_empty());
}

#[tokio::test]
async fn test_info_without_header_is_rejected() {
    let (client, _) = setup().await;
    let raw = client.get_raw("/privet/info", None).await.unwrap();
    assert_eq!(raw.status, StatusCode::BAD_REQUEST.as_u16());
    assert_eq!(raw.error_code(), Some("invalid_x_privet_token"));
}

#[tokio::test]
async fn test_registration_flow() {
    let (client, state) = setup().await;
    let user = "tester@example.com";

    let started = client.register(RegisterAction::Start, user).await.unwrap();
    assert_eq!(started.action, "start");

    let pending = client.register(RegisterAction::GetClaimToken, user).await.unwrap_err();
    assert_eq!(pending.privet_code(), Some("pending_user_action"));

    let claim = client.register(RegisterAction::GetClaimToken, user).await.unwrap();
    assert_eq!(claim.token.as_deref(), Some("claim-abc"));

    let complete = client.register(RegisterAction::Complete, user).await.unwrap();
    assert_eq!(complete.device_id.as_deref(), Some("device-42"));
    assert_eq!(state.lock().unwrap().registered_user.as_deref(), Some(user));
    assert!(client.info().await.unwrap().is_registered());
}

#[tokio::test]
async fn test_invalid_token_rejected() {
    let (client, _) = setup().await;
    let raw = client.get_raw("/privet/capabilities", Some("bogus")).await.unwrap();
    assert_eq!(raw.error_code(), Some("invalid_x_privet_token"));

    assert_eq!(client.privet_token().await.unwrap(), TOKEN);
}

#[tokio::test]
async fn test_access_token_requires_auth() {
    let (client, _) = setup().await;
    let raw = client.access_token_raw("tester@example.com").await.unwrap();
    assert_eq!(raw.status, StatusCode::FORBIDDEN.as_u16());
    assert_eq!(raw.error_code(), Some("invalid_auth"));
}

#[tokio::test]
async fn test_capabilities_and_submit() {
    let (client, state) = setup().await;
    let caps = client.capabilities().await.unwrap();
    assert_eq!(caps["version"], "1.0");

    let result = client
        .submit_doc(None, b"%PDF-1.4 test".to_vec(), "application/pdf")
        .await
        .unwrap();
    assert_eq!(result["job_id"], "local-1");

    let state = state.lock().unwrap();
    assert_eq!(state.submitted, vec![(None, 13, "application/pdf".to_string())]);
}

#[tokio::test]
async fn test_rotated_token_is_refetched_after_rejection() {
    let (client, state) = setup().await;
    client.capabilities().await.unwrap();
    assert_eq!(state.lock().unwrap().info_requests, 1);

    state.lock().unwrap().rotate_token();

    let rejected = client.capabilities().await.unwrap_err();
    assert!(matches!(rejected, CertError::Privet { .. }), "{}", rejected);
    assert_eq!(rejected.privet_code(), Some("invalid_x_privet_token"));

    let caps = client.capabilities().await.unwrap();
    assert_eq!(caps["version"], "1.0");
    assert_eq!(state.lock().unwrap().info_requests, 2);
    assert_eq!(client.privet_token().await.unwrap(), format!("{}-1", TOKEN));
}

#[tokio::test]
async fn test_create_job_then_submit() {
    let (client, state) = setup().await;
    let ticket = json!({"version": "1.0", "print": {"copies": {"copies": 1}}});

    let job_id = client.create_job(&ticket).await.unwrap();
    assert_eq!(job_id, "local-1");

    client
        .submit_doc(Some(&job_id), b"%PDF-1.4 test".to_vec(), "application/pdf")
        .await
        .unwrap();

    let state = state.lock().unwrap();
    assert_eq!(state.tickets, vec![ticket]);
    assert_eq!(state.submitted[0].0.as_deref(), Some("local-1"));
}

#[tokio::test]
async fn test_create_job_after_rotation() {
    let (client, state) = setup().await;
    let ticket = json!({"version": "1.0"});
    client.create_job(&ticket).await.unwrap();

    state.lock().unwrap().rotate_token();

    let rejected = client.create_job(&ticket).await.unwrap_err();
    assert_eq!(rejected.privet_code(), Some("invalid_x_privet_token"));
    assert_eq!(client.create_job(&ticket).await.unwrap(), "local-2");
}

#[tokio::test]
async fn test_unreachable_device() {
    let client = PrivetClient::new("http://127.0.0.1:9").unwrap();
    assert!(matches!(client.info().await, Err(CertError::Api(_))));
}
