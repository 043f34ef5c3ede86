//! Sheets client against an in-process fake of the Google APIs

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use logocert_core::config::CertConfig;
use logocert_core::CertError;
use logocert_gdocs::{OAuthCredentials, SheetsClient, TokenManager, Worksheet};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct FakeGoogle {
    spreadsheets: Vec<(String, String)>,
    header_row: Vec<String>,
    appended: Vec<Vec<String>>,
    /// Responses to serve before behaving normally
    pending_failures: Vec<StatusCode>,
    valid_token: String,
    refresh_calls: usize,
    seen_ranges: Vec<String>,
}

type Shared = Arc<Mutex<FakeGoogle>>;

fn authorized(state: &FakeGoogle, headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", state.valid_token))
        .unwrap_or(false)
}

/// Common gate: auth check, then any queued failure
fn gate(state: &mut FakeGoogle, headers: &HeaderMap) -> Option<Response> {
    if !authorized(state, headers) {
        return Some(StatusCode::UNAUTHORIZED.into_response());
    }
    if !state.pending_failures.is_empty() {
        let status = state.pending_failures.remove(0);
        let mut response = (status, "try again").into_response();
        if status == StatusCode::TOO_MANY_REQUESTS {
            response.headers_mut().insert("retry-after", "0".parse().unwrap());
        }
        return Some(response);
    }
    None
}

async fn token(State(state): State<Shared>, Form(form): Form<HashMap<String, String>>) -> Response {
    let mut state = state.lock().unwrap();
    if form.get("grant_type").map(String::as_str) != Some("refresh_token")
        || form.get("refresh_token").map(String::as_str) != Some("refresh-abc")
    {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"}))).into_response();
    }
    state.refresh_calls += 1;
    state.valid_token = format!("fresh-{}", state.refresh_calls);
    Json(json!({"access_token": state.valid_token, "expires_in": 3600, "token_type": "Bearer"})).into_response()
}

async fn create_spreadsheet(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(response) = gate(&mut state, &headers) {
        return response;
    }
    let title = body["properties"]["title"].as_str().unwrap_or_default().to_string();
    let id = format!("sheet-{}", state.spreadsheets.len() + 1);
    state.spreadsheets.push((id.clone(), title));
    Json(json!({"spreadsheetId": id})).into_response()
}

async fn list_files(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(response) = gate(&mut state, &headers) {
        return response;
    }
    let q = query.get("q").cloned().unwrap_or_default();
    let files: Vec<Value> = state
        .spreadsheets
        .iter()
        .filter(|(_, title)| q.contains(&format!("name = '{}'", title)))
        .map(|(id, title)| json!({"id": id, "name": title}))
        .collect();
    Json(json!({ "files": files })).into_response()
}

async fn get_spreadsheet(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(response) = gate(&mut state, &headers) {
        return response;
    }
    if !state.spreadsheets.iter().any(|(sid, _)| *sid == id) {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(json!({"sheets": [{"properties": {"sheetId": 0, "title": "Sheet1"}}]})).into_response()
}

async fn get_values(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((_id, range)): Path<(String, String)>,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(response) = gate(&mut state, &headers) {
        return response;
    }
    state.seen_ranges.push(range.clone());
    if state.header_row.is_empty() {
        return Json(json!({ "range": range })).into_response();
    }
    Json(json!({ "range": range, "values": [state.header_row] })).into_response()
}

async fn put_values(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((_id, range)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(response) = gate(&mut state, &headers) {
        return response;
    }
    state.seen_ranges.push(range);
    state.header_row = serde_json::from_value(body["values"][0].clone()).unwrap_or_default();
    Json(json!({"updatedCells": state.header_row.len()})).into_response()
}

async fn append_values(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((_id, range)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(response) = gate(&mut state, &headers) {
        return response;
    }
    assert!(range.ends_with(":append"), "unexpected range {}", range);
    state.seen_ranges.push(range);
    let row: Vec<String> = serde_json::from_value(body["values"][0].clone()).unwrap_or_default();
    state.appended.push(row);
    Json(json!({"updates": {"updatedRows": 1}})).into_response()
}

async fn start_fake(state: Shared) -> String {
    let app = Router::new()
        .route("/token", post(token))
        .route("/v4/spreadsheets", post(create_spreadsheet))
        .route("/v4/spreadsheets/:id", get(get_spreadsheet))
        .route(
            "/v4/spreadsheets/:id/values/:range",
            get(get_values).put(put_values).post(append_values),
        )
        .route("/drive/v3/files", get(list_files))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn client_with(state: Shared, access_token: Option<&str>) -> SheetsClient {
    let base = start_fake(state).await;
    let mut creds = OAuthCredentials::from_config(&CertConfig::default());
    creds.token_uri = format!("{}/token", base);
    creds.access_token = access_token.map(str::to_string);
    creds.refresh_token = Some("refresh-abc".to_string());

    SheetsClient::with_base_urls(
        Arc::new(TokenManager::new(creds)),
        &format!("{}/v4", base),
        &format!("{}/drive/v3", base),
    )
    .with_backoff(Duration::from_millis(5))
}

fn shared(valid_token: &str) -> Shared {
    Arc::new(Mutex::new(FakeGoogle {
        valid_token: valid_token.to_string(),
        ..Default::default()
    }))
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn headers() -> Vec<String> {
    strings(&["Suite", "Test", "Result", "Notes"])
}

#[tokio::test]
async fn test_create_and_find_spreadsheet() {
    let state = shared("token-1");
    let client = client_with(state.clone(), Some("token-1")).await;

    assert_eq!(client.spreadsheet_id("Logocert Results").await.unwrap(), None);

    let id = client.create_sheet("Logocert Results").await.unwrap();
    assert_eq!(client.spreadsheet_id("Logocert Results").await.unwrap(), Some(id.clone()));

    let worksheet = client.worksheet_id(&id).await.unwrap().unwrap();
    assert_eq!(
        worksheet,
        Worksheet {
            id: 0,
            title: "Sheet1".to_string()
        }
    );
}

#[tokio::test]
async fn test_headers_then_rows() {
    let state = shared("token-1");
    let client = client_with(state.clone(), Some("token-1")).await;
    let id = client.create_sheet("Results").await.unwrap();
    let worksheet = client.worksheet_id(&id).await.unwrap().unwrap();

    client.create_column_headers(&headers(), &id, &worksheet).await.unwrap();
    client
        .add_row_using_column_headers(
            &headers(),
            &strings(&["Privet Tests", "info", "PASSED", ""]),
            &id,
            &worksheet,
        )
        .await
        .unwrap();

    let state = state.lock().unwrap();
    assert_eq!(state.header_row, headers());
    assert_eq!(state.appended, vec![vec!["Privet Tests", "info", "PASSED", ""]]);
    assert!(state.seen_ranges.contains(&"'Sheet1'!A1:D1".to_string()));
}

#[tokio::test]
async fn test_row_without_headers_is_rejected() {
    let state = shared("token-1");
    let client = client_with(state.clone(), Some("token-1")).await;
    let id = client.create_sheet("Results").await.unwrap();
    let worksheet = client.worksheet_id(&id).await.unwrap().unwrap();

    let err = client
        .add_row_using_column_headers(&headers(), &strings(&["a", "b", "c", "d"]), &id, &worksheet)
        .await
        .unwrap_err();
    assert!(matches!(err, CertError::Sheets(_)));
    assert!(state.lock().unwrap().appended.is_empty());
}

#[tokio::test]
async fn test_retries_rate_limits_and_server_errors() {
    let state = shared("token-1");
    state.lock().unwrap().pending_failures = vec![
        StatusCode::TOO_MANY_REQUESTS,
        StatusCode::SERVICE_UNAVAILABLE,
    ];
    let client = client_with(state.clone(), Some("token-1")).await;

    let id = client.create_sheet("Results").await.unwrap();
    assert_eq!(id, "sheet-1");
    assert!(state.lock().unwrap().pending_failures.is_empty());
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let state = shared("token-1");
    state.lock().unwrap().pending_failures = vec![StatusCode::FORBIDDEN, StatusCode::FORBIDDEN];
    let client = client_with(state.clone(), Some("token-1")).await;

    let err = client.create_sheet("Results").await.unwrap_err();
    assert!(matches!(err, CertError::Sheets(_)));
    assert_eq!(state.lock().unwrap().pending_failures.len(), 1);
}

#[tokio::test]
async fn test_rejected_token_is_refreshed() {
    let state = shared("unused");
    let client = client_with(state.clone(), Some("stale-token")).await;

    // First refresh produces "fresh-1"; the fake only accepts that after the refresh
    state.lock().unwrap().valid_token = "fresh-1".to_string();
    let id = client.create_sheet("Results").await.unwrap();

    assert_eq!(id, "sheet-1");
    assert_eq!(state.lock().unwrap().refresh_calls, 1);
}
