//! OAuth2 tokens for the Google document APIs
//!
//! Tokens come from the config file (or `LOGOCERT_*` environment overrides).
//! An operator runs `logocert auth url`, consents in a browser, and feeds the
//! returned code to `logocert auth exchange` once; after that the refresh token
//! keeps the harness authorized.

use logocert_core::config::CertConfig;
use logocert_core::{CertError, Result};
use reqwest::Url;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Tokens are refreshed this long before they actually expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Client identity, endpoints and any tokens already issued
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub scopes: Vec<String>,
    pub auth_uri: String,
    pub token_uri: String,
    pub redirect_uri: String,
    pub user_agent: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl OAuthCredentials {
    /// Credentials from a loaded config (environment overrides already applied)
    pub fn from_config(config: &CertConfig) -> Self {
        Self {
            client_id: config.account.client_id.clone(),
            client_secret: config.account.client_secret.clone(),
            scopes: config.auth.scopes.clone(),
            auth_uri: config.auth.auth_uri.clone(),
            token_uri: config.auth.token_uri.clone(),
            redirect_uri: config.auth.redirect_uri.clone(),
            user_agent: config.auth.user_agent.clone(),
            access_token: config.auth.access_token.clone(),
            refresh_token: config.auth.refresh_token.clone(),
        }
    }

    /// Consent page URL requesting offline access, so a refresh token is issued
    pub fn authorization_url(&self) -> Result<String> {
        let scope = self.scopes.join(" ");
        let url = Url::parse_with_params(
            &self.auth_uri,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| CertError::Config(format!("Invalid auth_uri '{}': {}", self.auth_uri, e)))?;
        Ok(url.to_string())
    }
}

/// Token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

async fn post_token_request(
    http: &reqwest::Client,
    creds: &OAuthCredentials,
    params: &[(&str, &str)],
) -> Result<TokenResponse> {
    let response = http
        .post(&creds.token_uri)
        .header(reqwest::header::USER_AGENT, &creds.user_agent)
        .form(params)
        .send()
        .await
        .map_err(|e| CertError::Auth(format!("Token request failed: {}", e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| CertError::Auth(format!("Failed to read token response: {}", e)))?;

    if !status.is_success() {
        let detail = match serde_json::from_str::<TokenError>(&body) {
            Ok(err) => match err.error_description {
                Some(description) => format!("{}: {}", err.error, description),
                None => err.error,
            },
            Err(_) => body,
        };
        return Err(CertError::Auth(format!("Token endpoint returned {}: {}", status, detail)));
    }

    serde_json::from_str(&body).map_err(|e| CertError::Auth(format!("Malformed token response: {}", e)))
}

/// Trade an authorization code for access and refresh tokens
pub async fn exchange_code(
    http: &reqwest::Client,
    creds: &OAuthCredentials,
    code: &str,
) -> Result<TokenResponse> {
    info!("Exchanging authorization code for tokens");
    post_token_request(
        http,
        creds,
        &[
            ("code", code),
            ("client_id", &creds.client_id),
            ("client_secret", &creds.client_secret),
            ("redirect_uri", &creds.redirect_uri),
            ("grant_type", "authorization_code"),
        ],
    )
    .await
}

/// Get a fresh access token using the stored refresh token
pub async fn refresh(http: &reqwest::Client, creds: &OAuthCredentials) -> Result<TokenResponse> {
    let refresh_token = creds
        .refresh_token
        .as_deref()
        .ok_or_else(|| CertError::Auth("No refresh token configured; run `logocert auth url`".to_string()))?;

    debug!("Refreshing access token");
    post_token_request(
        http,
        creds,
        &[
            ("refresh_token", refresh_token),
            ("client_id", &creds.client_id),
            ("client_secret", &creds.client_secret),
            ("grant_type", "refresh_token"),
        ],
    )
    .await
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    /// `None` for configured tokens of unknown lifetime
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn from_response(response: &TokenResponse, now: Instant) -> Self {
        Self {
            token: response.access_token.clone(),
            expires_at: response.expires_in.map(|secs| now + Duration::from_secs(secs)),
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires_at) => now + EXPIRY_MARGIN < expires_at,
            None => true,
        }
    }
}

/// Hands out access tokens, refreshing them shortly before expiry
pub struct TokenManager {
    http: reqwest::Client,
    creds: OAuthCredentials,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(creds: OAuthCredentials) -> Self {
        let cached = creds.access_token.clone().map(|token| CachedToken {
            token,
            expires_at: None,
        });
        Self {
            http: reqwest::Client::new(),
            creds,
            cached: Mutex::new(cached),
        }
    }

    pub fn credentials(&self) -> &OAuthCredentials {
        &self.creds
    }

    /// A usable access token, refreshing when the cached one is stale
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.token.clone());
        }

        let response = refresh(&self.http, &self.creds).await?;
        let token = CachedToken::from_response(&response, Instant::now());
        info!(
            "Access token refreshed (expires in {}s)",
            response.expires_in.unwrap_or_default()
        );
        let value = token.token.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Drop the cached token after the API rejected it
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> OAuthCredentials {
        OAuthCredentials::from_config(&CertConfig::default())
    }

    #[test]
    fn test_authorization_url_requests_offline_access() {
        let mut creds = credentials();
        creds.client_id = "client-123.apps.googleusercontent.com".to_string();
        let url = Url::parse(&creds.authorization_url().unwrap()).unwrap();

        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "client-123.apps.googleusercontent.com");
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["response_type"], "code");
        assert!(params["scope"].contains("https://www.googleapis.com/auth/spreadsheets"));
    }

    #[test]
    fn test_invalid_auth_uri() {
        let mut creds = credentials();
        creds.auth_uri = "not a url".to_string();
        assert!(matches!(creds.authorization_url(), Err(CertError::Config(_))));
    }

    #[test]
    fn test_cached_token_freshness() {
        let now = Instant::now();
        let response = TokenResponse {
            access_token: "ya29.token".to_string(),
            expires_in: Some(3600),
            refresh_token: None,
            token_type: Some("Bearer".to_string()),
            scope: None,
        };
        let token = CachedToken::from_response(&response, now);
        assert!(token.is_fresh(now));
        assert!(token.is_fresh(now + Duration::from_secs(3500)));
        assert!(!token.is_fresh(now + Duration::from_secs(3541)));

        let configured = CachedToken {
            token: "configured".to_string(),
            expires_at: None,
        };
        assert!(configured.is_fresh(now + Duration::from_secs(86_400)));
    }

    #[tokio::test]
    async fn test_configured_token_used_without_refresh() {
        let mut creds = credentials();
        creds.access_token = Some("configured-token".to_string());
        let manager = TokenManager::new(creds);
        assert_eq!(manager.access_token().await.unwrap(), "configured-token");
    }

    #[tokio::test]
    async fn test_refresh_requires_refresh_token() {
        let manager = TokenManager::new(credentials());
        let err = manager.access_token().await.unwrap_err();
        assert!(matches!(err, CertError::Auth(_)));
    }
}
