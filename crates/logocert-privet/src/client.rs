//! Client for a printer's local Privet HTTP API

use async_trait::async_trait;
use logocert_core::{CertError, Result};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const PRIVET_TOKEN_HEADER: &str = "X-Privet-Token";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// `/privet/info` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivetInfo {
    pub version: String,
    pub name: String,
    pub description: String,
    pub url: String,
    #[serde(rename = "type")]
    pub device_type: Vec<String>,
    pub id: String,
    pub device_state: String,
    pub connection_state: String,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub firmware: String,
    pub uptime: u64,
    pub setup_url: String,
    pub support_url: String,
    pub update_url: String,
    #[serde(rename = "x-privet-token")]
    pub x_privet_token: String,
    pub api: Vec<String>,
    pub semantic_state: Option<Value>,
}

impl PrivetInfo {
    /// Fields a compliant device must fill in
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        let checks: [(&'static str, bool); 8] = [
            ("version", self.version.is_empty()),
            ("name", self.name.is_empty()),
            ("url", self.url.is_empty()),
            ("type", self.device_type.is_empty()),
            ("device_state", self.device_state.is_empty()),
            ("connection_state", self.connection_state.is_empty()),
            ("x-privet-token", self.x_privet_token.is_empty()),
            ("api", self.api.is_empty()),
        ];
        for (field, is_missing) in checks {
            if is_missing {
                missing.push(field);
            }
        }
        missing
    }

    pub fn supports_api(&self, path: &str) -> bool {
        self.api.iter().any(|a| a == path)
    }

    pub fn is_registered(&self) -> bool {
        !self.id.is_empty()
    }
}

/// Response of the `/privet/register` actions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationResponse {
    pub action: String,
    pub user: String,
    /// Claim token returned by `getClaimToken`
    pub token: Option<String>,
    pub claim_url: Option<String>,
    pub automated_claim_url: Option<String>,
    pub device_id: Option<String>,
}

impl std::fmt::Display for RegistrationResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.action)?;
        if self.token.is_some() {
            write!(f, " (claim token issued)")?;
        }
        if let Some(device_id) = &self.device_id {
            write!(f, " (device {})", device_id)?;
        }
        Ok(())
    }
}

/// Raw HTTP outcome, for checks that expect the device to refuse a request
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl RawResponse {
    /// Privet `error` code in the body, if any
    pub fn error_code(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }
}

/// Registration steps of the `/privet/register` endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterAction {
    Start,
    GetClaimToken,
    Complete,
    Cancel,
}

impl RegisterAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::GetClaimToken => "getClaimToken",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
        }
    }
}

/// Map a response body carrying `{"error": ...}` to a Privet error
fn privet_error(endpoint: &str, body: &Value) -> Option<CertError> {
    let code = body.get("error")?.as_str()?.to_string();
    let description = body
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(CertError::Privet {
        endpoint: endpoint.to_string(),
        code,
        description,
    })
}

/// Local API operations the suites exercise
#[async_trait]
pub trait PrivetDevice: Send + Sync {
    async fn info(&self) -> Result<PrivetInfo>;

    /// GET `path` with the token header as given (`None` omits it)
    async fn get_raw(&self, path: &str, token: Option<&str>) -> Result<RawResponse>;

    /// The device's current `X-Privet-Token`
    async fn privet_token(&self) -> Result<String>;

    async fn register(&self, action: RegisterAction, user: &str) -> Result<RegistrationResponse>;

    /// `/privet/accesstoken` without user credentials, to check it is refused
    async fn access_token_raw(&self, user: &str) -> Result<RawResponse>;

    async fn capabilities(&self) -> Result<Value>;
}

/// HTTP client bound to one device
pub struct PrivetClient {
    http: reqwest::Client,
    base_url: String,
    token: Mutex<Option<String>>,
}

impl PrivetClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CertError::Api(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        })
    }

    /// Client for `http://{host}:{port}`
    pub fn for_host(host: &str, port: u16) -> Result<Self> {
        Self::new(format!("http://{}:{}", host, port))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request_raw(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        token: Option<&str>,
        body: Option<(Vec<u8>, &str)>,
    ) -> Result<RawResponse> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let mut request = self.http.request(method, &url).query(query);
        if let Some(token) = token {
            request = request.header(PRIVET_TOKEN_HEADER, token);
        }
        if let Some((bytes, content_type)) = body {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type).body(bytes);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CertError::Api(format!("Privet request to {} failed: {}", path, e)))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CertError::Api(format!("Failed to read {} response: {}", path, e)))?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(RawResponse { status, body })
    }

    /// Current `X-Privet-Token`, fetching `/privet/info` on first use
    async fn cached_token(&self) -> Result<String> {
        let mut token = self.token.lock().await;
        if let Some(existing) = token.as_ref() {
            return Ok(existing.clone());
        }
        let info = self.info().await?;
        *token = Some(info.x_privet_token.clone());
        Ok(info.x_privet_token)
    }

    /// Forget the cached token, e.g. after `invalid_x_privet_token`
    pub async fn reset_token(&self) {
        *self.token.lock().await = None;
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<(Vec<u8>, &str)>,
    ) -> Result<T> {
        let token = self.cached_token().await?;
        let raw = self.request_raw(method, path, query, Some(&token), body).await?;

        if let Some(err) = privet_error(path, &raw.body) {
            if err.privet_code() == Some("invalid_x_privet_token") {
                self.reset_token().await;
            }
            return Err(err);
        }
        if !raw.status.is_success() {
            return Err(CertError::Api(format!("{} returned {}", path, raw.status)));
        }
        Ok(serde_json::from_value(raw.body)?)
    }

    /// Start a local job with a print ticket, returning the job id
    pub async fn create_job(&self, ticket: &Value) -> Result<String> {
        let body = serde_json::to_vec(ticket)?;
        let response: Value = self
            .call(
                Method::POST,
                "/privet/printer/createjob",
                &[],
                Some((body, "application/json")),
            )
            .await?;
        response
            .get("job_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CertError::Api("createjob response missing job_id".to_string()))
    }

    /// Send a document, optionally for a job created with [`Self::create_job`]
    pub async fn submit_doc(&self, job_id: Option<&str>, document: Vec<u8>, content_type: &str) -> Result<Value> {
        let mut query = Vec::new();
        if let Some(job_id) = job_id {
            query.push(("job_id", job_id));
        }
        info!("Submitting {} byte document ({})", document.len(), content_type);
        self.call(
            Method::POST,
            "/privet/printer/submitdoc",
            &query,
            Some((document, content_type)),
        )
        .await
    }
}

#[async_trait]
impl PrivetDevice for PrivetClient {
    async fn info(&self) -> Result<PrivetInfo> {
        // /privet/info always takes an empty token
        let raw = self.request_raw(Method::GET, "/privet/info", &[], Some(""), None).await?;
        if let Some(err) = privet_error("/privet/info", &raw.body) {
            return Err(err);
        }
        if !raw.status.is_success() {
            return Err(CertError::Api(format!("/privet/info returned {}", raw.status)));
        }
        Ok(serde_json::from_value(raw.body)?)
    }

    async fn get_raw(&self, path: &str, token: Option<&str>) -> Result<RawResponse> {
        self.request_raw(Method::GET, path, &[], token, None).await
    }

    async fn privet_token(&self) -> Result<String> {
        self.cached_token().await
    }

    async fn register(&self, action: RegisterAction, user: &str) -> Result<RegistrationResponse> {
        info!("Privet register action={} user={}", action.as_str(), user);
        self.call(
            Method::POST,
            "/privet/register",
            &[("action", action.as_str()), ("user", user)],
            None,
        )
        .await
    }

    async fn access_token_raw(&self, user: &str) -> Result<RawResponse> {
        let token = self.cached_token().await?;
        self.request_raw(
            Method::GET,
            "/privet/accesstoken",
            &[("user", user)],
            Some(&token),
            None,
        )
        .await
    }

    async fn capabilities(&self) -> Result<Value> {
        self.call(Method::GET, "/privet/capabilities", &[], None).await
    }
}
