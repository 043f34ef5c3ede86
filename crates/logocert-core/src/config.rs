//! Configuration for a certification run
//!
//! Everything that used to be hand-edited per device under test lives in one
//! TOML file (`logocert.toml` by default). Every section has defaults, so a
//! partial file only needs the values that differ for the printer at hand.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{CertError, Result, SuiteKind};

/// Default config file name, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "logocert.toml";

/// Top-level harness configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub capabilities: Capabilities,

    #[serde(default)]
    pub account: AccountConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub gcp: GcpConfig,

    #[serde(default)]
    pub browser: BrowserSettings,

    #[serde(default)]
    pub sheets: SheetsConfig,

    #[serde(default)]
    pub timeouts: Timeouts,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub suites: SuiteSelection,
}

/// The printer under test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Name (or unique partial name) as shown on the management page
    #[serde(default = "default_device_name")]
    pub name: String,

    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub manufacturer: String,

    #[serde(default)]
    pub serial_no: String,

    #[serde(default)]
    pub firmware: String,

    /// Privet address; discovered over mDNS when absent
    #[serde(default)]
    pub address: Option<String>,

    #[serde(default = "default_privet_port")]
    pub port: u16,
}

/// Features the device claims to support; unsupported areas are skipped
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default = "default_true")]
    pub local_discovery: bool,

    #[serde(default = "default_true")]
    pub local_printing: bool,

    #[serde(default)]
    pub conversion_printing: bool,

    #[serde(default = "default_true")]
    pub color: bool,

    #[serde(default)]
    pub duplex: bool,

    #[serde(default = "default_true")]
    pub copies: bool,
}

/// Test account used for registration and the results sheet
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,
}

/// OAuth2 tokens and endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,

    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Cloud Print web pages driven through the browser
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcpConfig {
    #[serde(default = "default_mgt_url")]
    pub mgt_url: String,

    #[serde(default = "default_printers_url")]
    pub printers_url: String,

    #[serde(default = "default_jobs_url")]
    pub jobs_url: String,

    #[serde(default = "default_simulate_url")]
    pub simulate_url: String,

    /// Title of the job produced by the simulate page print gadget
    #[serde(default = "default_test_document")]
    pub test_document: String,
}

/// Browser launch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    #[serde(default)]
    pub headless: bool,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    #[serde(default = "default_browser_timeout")]
    pub timeout_seconds: u64,

    /// Chrome profile holding the signed-in test account
    #[serde(default)]
    pub user_data_dir: Option<PathBuf>,

    /// Attach to a running Chrome on this DevTools port instead of launching one
    #[serde(default)]
    pub devtools_port: Option<u16>,
}

/// Results spreadsheet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_spreadsheet_name")]
    pub spreadsheet_name: String,
}

/// Polling intervals and deadlines, all in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    #[serde(default = "default_job_timeout")]
    pub job: u64,

    #[serde(default = "default_printer_state_timeout")]
    pub printer_state: u64,

    #[serde(default = "default_discovery_window")]
    pub discovery: u64,

    #[serde(default = "default_claim_timeout")]
    pub claim: u64,
}

/// Where logs, results and screenshots go
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default = "default_results_file")]
    pub results_file: String,

    #[serde(default = "default_true")]
    pub screenshots_on_failure: bool,
}

/// Ordered list of suites to run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteSelection {
    #[serde(default = "SuiteKind::all")]
    pub enabled: Vec<SuiteKind>,
}

// Default value providers
fn default_true() -> bool {
    true
}

fn default_device_name() -> String {
    "Printer Under Test".to_string()
}

fn default_privet_port() -> u16 {
    80
}

fn default_scopes() -> Vec<String> {
    vec![
        "https://www.googleapis.com/auth/cloudprint".to_string(),
        "https://www.googleapis.com/auth/drive".to_string(),
        "https://www.googleapis.com/auth/spreadsheets".to_string(),
    ]
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_redirect_uri() -> String {
    "http://127.0.0.1:8085".to_string()
}

fn default_user_agent() -> String {
    format!("logocert/{}", env!("CARGO_PKG_VERSION"))
}

fn default_mgt_url() -> String {
    "https://www.google.com/cloudprint".to_string()
}

fn default_printers_url() -> String {
    "https://www.google.com/cloudprint#printers".to_string()
}

fn default_jobs_url() -> String {
    "https://www.google.com/cloudprint#jobs".to_string()
}

fn default_simulate_url() -> String {
    "https://www.google.com/cloudprint/simulate.html".to_string()
}

fn default_test_document() -> String {
    "Google Cloud Print Test Page".to_string()
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    1024
}

fn default_browser_timeout() -> u64 {
    30
}

fn default_spreadsheet_name() -> String {
    "Logocert Results".to_string()
}

fn default_poll_interval() -> u64 {
    5
}

fn default_job_timeout() -> u64 {
    300
}

fn default_printer_state_timeout() -> u64 {
    120
}

fn default_discovery_window() -> u64 {
    10
}

fn default_claim_timeout() -> u64 {
    60
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_results_file() -> String {
    "results.md".to_string()
}

impl CertConfig {
    /// Load configuration from `path`, failing if it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content).map_err(|e| {
            CertError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from `path` or use defaults when the file is absent
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Write the default configuration to `path`, creating parent directories
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| CertError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Secrets may come from the environment instead of the file
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("LOGOCERT_ACCESS_TOKEN") {
            self.auth.access_token = Some(token);
        }
        if let Ok(token) = std::env::var("LOGOCERT_REFRESH_TOKEN") {
            self.auth.refresh_token = Some(token);
        }
        if let Ok(secret) = std::env::var("LOGOCERT_CLIENT_SECRET") {
            self.account.client_secret = secret;
        }
    }

    /// Reject configurations the harness cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.device.name.trim().is_empty() {
            return Err(CertError::Config("device.name must not be empty".to_string()));
        }
        if self.timeouts.poll_interval == 0 {
            return Err(CertError::Config(
                "timeouts.poll_interval must be at least 1 second".to_string(),
            ));
        }
        if self.sheets.enabled && self.account.client_id.is_empty() {
            return Err(CertError::Config(
                "sheets.enabled requires account.client_id".to_string(),
            ));
        }
        if self.suites.enabled.is_empty() {
            return Err(CertError::Config("suites.enabled is empty".to_string()));
        }
        Ok(())
    }

    /// Path of the results log inside the log directory
    pub fn results_path(&self) -> PathBuf {
        self.output.log_dir.join(&self.output.results_file)
    }

    /// Directory that receives failure screenshots
    pub fn screenshot_dir(&self) -> PathBuf {
        self.output.log_dir.join("screenshots")
    }
}

impl Timeouts {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn job(&self) -> Duration {
        Duration::from_secs(self.job)
    }

    pub fn printer_state(&self) -> Duration {
        Duration::from_secs(self.printer_state)
    }

    pub fn discovery(&self) -> Duration {
        Duration::from_secs(self.discovery)
    }

    pub fn claim(&self) -> Duration {
        Duration::from_secs(self.claim)
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: default_device_name(),
            model: String::new(),
            manufacturer: String::new(),
            serial_no: String::new(),
            firmware: String::new(),
            address: None,
            port: default_privet_port(),
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            local_discovery: true,
            local_printing: true,
            conversion_printing: false,
            color: true,
            duplex: false,
            copies: true,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            scopes: default_scopes(),
            auth_uri: default_auth_uri(),
            token_uri: default_token_uri(),
            redirect_uri: default_redirect_uri(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            mgt_url: default_mgt_url(),
            printers_url: default_printers_url(),
            jobs_url: default_jobs_url(),
            simulate_url: default_simulate_url(),
            test_document: default_test_document(),
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: false,
            window_width: default_window_width(),
            window_height: default_window_height(),
            timeout_seconds: default_browser_timeout(),
            user_data_dir: None,
            devtools_port: None,
        }
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            spreadsheet_name: default_spreadsheet_name(),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            job: default_job_timeout(),
            printer_state: default_printer_state_timeout(),
            discovery: default_discovery_window(),
            claim: default_claim_timeout(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            results_file: default_results_file(),
            screenshots_on_failure: true,
        }
    }
}

impl Default for SuiteSelection {
    fn default() -> Self {
        Self {
            enabled: SuiteKind::all(),
        }
    }
}
