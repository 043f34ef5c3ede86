//! Everything a suite can reach during a run

use crate::prompt::Prompter;
use logocert_browser::BrowserSession;
use logocert_cloudprint::{CloudPrintPortal, PollSettings};
use logocert_core::CertConfig;
use logocert_privet::{PrinterDiscovery, PrivetDevice};
use std::sync::{Arc, Mutex, MutexGuard};

/// Registration progress shared between Registration cases
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationState {
    pub claim_token: Option<String>,
    pub claim_url: Option<String>,
    pub device_id: Option<String>,
}

pub struct SuiteContext {
    pub config: CertConfig,
    pub portal: Arc<dyn CloudPrintPortal>,
    pub device: Arc<dyn PrivetDevice>,
    pub discovery: Arc<dyn PrinterDiscovery>,
    pub prompter: Arc<dyn Prompter>,
    /// Present when the portal is browser backed, for failure screenshots
    pub browser: Option<Arc<BrowserSession>>,
    registration: Mutex<RegistrationState>,
}

impl SuiteContext {
    pub fn new(
        config: CertConfig,
        portal: Arc<dyn CloudPrintPortal>,
        device: Arc<dyn PrivetDevice>,
        discovery: Arc<dyn PrinterDiscovery>,
        prompter: Arc<dyn Prompter>,
    ) -> Self {
        Self {
            config,
            portal,
            device,
            discovery,
            prompter,
            browser: None,
            registration: Mutex::new(RegistrationState::default()),
        }
    }

    pub fn with_browser(mut self, browser: Arc<BrowserSession>) -> Self {
        self.browser = Some(browser);
        self
    }

    /// Printer name as configured (matched by substring on the management page)
    pub fn printer(&self) -> &str {
        &self.config.device.name
    }

    /// Test account used for registration
    pub fn user(&self) -> &str {
        &self.config.account.email
    }

    pub fn test_document(&self) -> &str {
        &self.config.gcp.test_document
    }

    pub fn job_poll(&self) -> PollSettings {
        PollSettings::for_jobs(&self.config.timeouts)
    }

    pub fn state_poll(&self) -> PollSettings {
        PollSettings::for_printer_state(&self.config.timeouts)
    }

    pub fn claim_poll(&self) -> PollSettings {
        PollSettings::new(self.config.timeouts.poll_interval(), self.config.timeouts.claim())
    }

    pub fn registration(&self) -> RegistrationState {
        self.registration_state().clone()
    }

    pub fn update_registration(&self, update: impl FnOnce(&mut RegistrationState)) {
        update(&mut self.registration_state());
    }

    // A case that panicked mid-update leaves the state as it was written so far
    fn registration_state(&self) -> MutexGuard<'_, RegistrationState> {
        self.registration.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
