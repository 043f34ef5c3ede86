//! Fakes for the suite seams

#![allow(dead_code)]

use async_trait::async_trait;
use logocert_cloudprint::{AdvancedSetting, CloudPrintPortal};
use logocert_core::config::CertConfig;
use logocert_core::{CertError, JobStatus, PrinterState, Result};
use logocert_privet::{
    DiscoveredPrinter, PrinterDiscovery, PrivetDevice, PrivetInfo, RawResponse, RegisterAction, RegistrationResponse,
    StatusCode, PRIVET_SERVICE,
};
use logocert_suites::{ResultRecorder, ScriptedPrompter, SuiteContext};
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Values handed out in order; the last one repeats
pub struct Script<T: Clone>(Mutex<VecDeque<T>>);

impl<T: Clone> Script<T> {
    pub fn new(values: impl IntoIterator<Item = T>) -> Self {
        Self(Mutex::new(values.into_iter().collect()))
    }

    pub fn next(&self) -> Option<T> {
        let mut values = self.0.lock().unwrap();
        if values.len() > 1 {
            values.pop_front()
        } else {
            values.front().cloned()
        }
    }
}

/// Portal whose jobs list behaves like the dashboard: every submission adds a
/// job under the same title and lookups by title find the oldest one
pub struct FakePortal {
    pub states: Script<PrinterState>,
    pub messages: Script<Vec<String>>,
    pub error_state: bool,
    /// Status sequence for each submitted job, in submission order
    pub submissions: Script<Vec<JobStatus>>,
    pub listed_jobs: Mutex<Vec<Script<JobStatus>>>,
    pub pages: u32,
    pub fail_printing: bool,
    pub actions: Mutex<Vec<String>>,
}

impl Default for FakePortal {
    fn default() -> Self {
        Self {
            states: Script::new([PrinterState::Idle]),
            messages: Script::new([vec![]]),
            error_state: false,
            submissions: Script::new([vec![JobStatus::Printed]]),
            listed_jobs: Mutex::new(Vec::new()),
            pages: 1,
            fail_printing: false,
            actions: Mutex::new(Vec::new()),
        }
    }
}

impl FakePortal {
    fn log(&self, action: String) {
        self.actions.lock().unwrap().push(action);
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }

    pub fn listed_job_count(&self) -> usize {
        self.listed_jobs.lock().unwrap().len()
    }
}

#[async_trait]
impl CloudPrintPortal for FakePortal {
    async fn printer_name(&self, printer: &str) -> Result<String> {
        Ok(format!("{} (registered)", printer))
    }

    async fn printer_state(&self, _printer: &str) -> Result<PrinterState> {
        Ok(self.states.next().unwrap_or(PrinterState::Idle))
    }

    async fn printer_state_messages(&self, _printer: &str) -> Result<Vec<String>> {
        Ok(self.messages.next().unwrap_or_default())
    }

    async fn printer_error_state(&self, _printer: &str) -> Result<bool> {
        Ok(self.error_state)
    }

    async fn printer_details(&self, _printer: &str) -> Result<BTreeMap<String, String>> {
        Ok(BTreeMap::new())
    }

    async fn set_advanced_option(&self, _printer: &str, setting: AdvancedSetting, enabled: bool) -> Result<()> {
        self.log(format!("{}={}", setting, enabled));
        Ok(())
    }

    async fn delete_printer(&self, printer: &str) -> Result<()> {
        self.log(format!("delete printer {}", printer));
        Ok(())
    }

    async fn print_test_page(&self, printer: &str) -> Result<()> {
        if self.fail_printing {
            return Err(CertError::not_found("iframe.__gcp_dialog_iframe_cls"));
        }
        self.log(format!("print {}", printer));
        let statuses = self.submissions.next().unwrap_or_default();
        self.listed_jobs.lock().unwrap().push(Script::new(statuses));
        Ok(())
    }

    async fn job_status(&self, _job: &str) -> Result<Option<JobStatus>> {
        Ok(self.listed_jobs.lock().unwrap().first().and_then(|job| job.next()))
    }

    async fn job_state_message(&self, _job: &str) -> Result<Option<String>> {
        Ok(Some("Paper jam".to_string()))
    }

    async fn pages_printed(&self, _job: &str) -> Result<u32> {
        Ok(self.pages)
    }

    async fn delete_job(&self, job: &str) -> Result<()> {
        let mut listed = self.listed_jobs.lock().unwrap();
        if listed.is_empty() {
            return Err(CertError::not_found(format!("job '{}'", job)));
        }
        listed.remove(0);
        drop(listed);
        self.log(format!("delete job {}", job));
        Ok(())
    }

    async fn delete_jobs(&self, job: &str) -> Result<usize> {
        let deleted = {
            let mut listed = self.listed_jobs.lock().unwrap();
            let count = listed.len();
            listed.clear();
            count
        };
        self.log(format!("delete {} job(s) {}", deleted, job));
        Ok(deleted)
    }
}

pub fn compliant_info() -> PrivetInfo {
    serde_json::from_value(json!({
        "version": "1.0",
        "name": "Acme LaserJet",
        "url": "https://www.google.com/cloudprint",
        "type": ["printer"],
        "id": "",
        "device_state": "idle",
        "connection_state": "offline",
        "x-privet-token": "token-1",
        "api": ["/privet/accesstoken", "/privet/capabilities", "/privet/printer/submitdoc", "/privet/register"]
    }))
    .unwrap()
}

pub struct FakeDevice {
    pub infos: Script<PrivetInfo>,
    pub pending_claims: Mutex<usize>,
    pub registrations: Mutex<Vec<(RegisterAction, String)>>,
}

impl Default for FakeDevice {
    fn default() -> Self {
        Self {
            infos: Script::new([compliant_info()]),
            pending_claims: Mutex::new(0),
            registrations: Mutex::new(Vec::new()),
        }
    }
}

fn raw(status: StatusCode, body: Value) -> RawResponse {
    RawResponse { status, body }
}

#[async_trait]
impl PrivetDevice for FakeDevice {
    async fn info(&self) -> Result<PrivetInfo> {
        Ok(self.infos.next().unwrap_or_else(compliant_info))
    }

    async fn get_raw(&self, path: &str, token: Option<&str>) -> Result<RawResponse> {
        Ok(match (path, token) {
            (_, None) => raw(StatusCode::BAD_REQUEST, json!({"error": "invalid_x_privet_token"})),
            ("/privet/info", Some(_)) => raw(StatusCode::OK, serde_json::to_value(compliant_info())?),
            (_, Some("token-1")) => raw(StatusCode::OK, json!({})),
            (_, Some(_)) => raw(StatusCode::BAD_REQUEST, json!({"error": "invalid_x_privet_token"})),
        })
    }

    async fn privet_token(&self) -> Result<String> {
        Ok("token-1".to_string())
    }

    async fn register(&self, action: RegisterAction, user: &str) -> Result<RegistrationResponse> {
        self.registrations.lock().unwrap().push((action, user.to_string()));
        let mut response = RegistrationResponse {
            action: action.as_str().to_string(),
            user: user.to_string(),
            ..Default::default()
        };
        match action {
            RegisterAction::GetClaimToken => {
                let mut pending = self.pending_claims.lock().unwrap();
                if *pending > 0 {
                    *pending -= 1;
                    return Err(CertError::Privet {
                        endpoint: "/privet/register".to_string(),
                        code: "pending_user_action".to_string(),
                        description: String::new(),
                    });
                }
                response.token = Some("claim-abc".to_string());
                response.claim_url = Some("https://www.google.com/cloudprint/claimprinter.html".to_string());
            }
            RegisterAction::Complete => response.device_id = Some("device-42".to_string()),
            _ => {}
        }
        Ok(response)
    }

    async fn access_token_raw(&self, _user: &str) -> Result<RawResponse> {
        Ok(raw(StatusCode::FORBIDDEN, json!({"error": "invalid_auth"})))
    }

    async fn capabilities(&self) -> Result<Value> {
        Ok(json!({"version": "1.0"}))
    }
}

pub fn advertised_printer() -> DiscoveredPrinter {
    let txt = [
        ("txtvers", "1"),
        ("ty", "Acme LaserJet"),
        ("url", "https://www.google.com/cloudprint"),
        ("type", "printer"),
        ("id", ""),
        ("cs", "not-configured"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    DiscoveredPrinter {
        instance: format!("Acme LaserJet.{}", PRIVET_SERVICE),
        hostname: "acme.local.".to_string(),
        addresses: vec!["192.168.1.20".parse().unwrap()],
        port: 80,
        txt,
    }
}

pub struct FakeDiscovery {
    pub rounds: Script<Vec<DiscoveredPrinter>>,
}

impl FakeDiscovery {
    pub fn advertising(printers: Vec<DiscoveredPrinter>) -> Self {
        Self {
            rounds: Script::new([printers]),
        }
    }
}

#[async_trait]
impl PrinterDiscovery for FakeDiscovery {
    async fn browse(&self, _window: Duration) -> Result<Vec<DiscoveredPrinter>> {
        Ok(self.rounds.next().unwrap_or_default())
    }
}

/// Config with one-second deadlines so timeouts resolve after a single poll
pub fn fast_config(log_dir: &Path) -> CertConfig {
    let mut config = CertConfig::default();
    config.device.name = "Acme LaserJet".to_string();
    config.account.email = "tester@example.com".to_string();
    config.timeouts.poll_interval = 1;
    config.timeouts.job = 1;
    config.timeouts.printer_state = 1;
    config.timeouts.claim = 1;
    config.timeouts.discovery = 0;
    config.output.log_dir = log_dir.to_path_buf();
    config
}

pub struct Harness {
    pub portal: Arc<FakePortal>,
    pub device: Arc<FakeDevice>,
    pub discovery: Arc<FakeDiscovery>,
    pub prompter: Arc<ScriptedPrompter>,
}

impl Harness {
    pub fn new(portal: FakePortal, device: FakeDevice, discovery: FakeDiscovery, answers: Vec<bool>) -> Self {
        Self {
            portal: Arc::new(portal),
            device: Arc::new(device),
            discovery: Arc::new(discovery),
            prompter: Arc::new(ScriptedPrompter::new(answers)),
        }
    }

    pub fn context(&self, config: CertConfig) -> SuiteContext {
        SuiteContext::new(
            config,
            self.portal.clone(),
            self.device.clone(),
            self.discovery.clone(),
            self.prompter.clone(),
        )
    }
}

pub fn recorder(config: &CertConfig) -> ResultRecorder {
    ResultRecorder::new(config.results_path())
}
