//! Seam between certification suites and the Cloud Print web UI

use crate::manager::{AdvancedSetting, CloudPrintManager};
use async_trait::async_trait;
use logocert_core::{CertError, JobStatus, PrinterState, Result};
use std::collections::BTreeMap;

/// Printer and job operations the suites rely on
#[async_trait]
pub trait CloudPrintPortal: Send + Sync {
    /// Registered printer name as shown on the details page
    async fn printer_name(&self, printer: &str) -> Result<String>;

    async fn printer_state(&self, printer: &str) -> Result<PrinterState>;

    async fn printer_state_messages(&self, printer: &str) -> Result<Vec<String>>;

    /// Whether the dashboard flags the printer with an error icon
    async fn printer_error_state(&self, printer: &str) -> Result<bool>;

    async fn printer_details(&self, printer: &str) -> Result<BTreeMap<String, String>>;

    async fn set_advanced_option(
        &self,
        printer: &str,
        setting: AdvancedSetting,
        enabled: bool,
    ) -> Result<()>;

    async fn delete_printer(&self, printer: &str) -> Result<()>;

    /// Print the standard test document to the printer
    async fn print_test_page(&self, printer: &str) -> Result<()>;

    /// `None` when the job is not listed
    async fn job_status(&self, job: &str) -> Result<Option<JobStatus>>;

    async fn job_state_message(&self, job: &str) -> Result<Option<String>>;

    async fn pages_printed(&self, job: &str) -> Result<u32>;

    async fn delete_job(&self, job: &str) -> Result<()>;

    /// Delete every listed job matching `job`, returning how many were removed
    async fn delete_jobs(&self, job: &str) -> Result<usize>;
}

#[async_trait]
impl CloudPrintPortal for CloudPrintManager {
    async fn printer_name(&self, printer: &str) -> Result<String> {
        CloudPrintManager::printer_name(self, printer).await
    }

    async fn printer_state(&self, printer: &str) -> Result<PrinterState> {
        CloudPrintManager::printer_state(self, printer).await
    }

    async fn printer_state_messages(&self, printer: &str) -> Result<Vec<String>> {
        CloudPrintManager::printer_state_messages(self, printer).await
    }

    async fn printer_error_state(&self, printer: &str) -> Result<bool> {
        CloudPrintManager::printer_error_state(self, printer).await
    }

    async fn printer_details(&self, printer: &str) -> Result<BTreeMap<String, String>> {
        CloudPrintManager::printer_details(self, printer).await
    }

    async fn set_advanced_option(
        &self,
        printer: &str,
        setting: AdvancedSetting,
        enabled: bool,
    ) -> Result<()> {
        self.toggle_advanced_option(printer, setting, enabled).await
    }

    async fn delete_printer(&self, printer: &str) -> Result<()> {
        CloudPrintManager::delete_printer(self, printer).await
    }

    async fn print_test_page(&self, printer: &str) -> Result<()> {
        self.print_from_web_dialog(printer).await
    }

    async fn job_status(&self, job: &str) -> Result<Option<JobStatus>> {
        CloudPrintManager::job_status(self, job).await
    }

    async fn job_state_message(&self, job: &str) -> Result<Option<String>> {
        self.job_details_state_message(job).await
    }

    async fn pages_printed(&self, job: &str) -> Result<u32> {
        CloudPrintManager::pages_printed(self, job).await
    }

    async fn delete_job(&self, job: &str) -> Result<()> {
        CloudPrintManager::delete_job(self, job).await
    }

    async fn delete_jobs(&self, job: &str) -> Result<usize> {
        CloudPrintManager::delete_jobs(self, job).await
    }
}

/// Stand-in for runs that never open the web UI
///
/// Every operation fails with a browser error naming why no session exists.
pub struct UnavailablePortal {
    reason: String,
}

impl UnavailablePortal {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    fn unavailable<T>(&self, operation: &str) -> Result<T> {
        Err(CertError::Browser(format!("{}: {}", operation, self.reason)))
    }
}

#[async_trait]
impl CloudPrintPortal for UnavailablePortal {
    async fn printer_name(&self, _printer: &str) -> Result<String> {
        self.unavailable("printer_name")
    }

    async fn printer_state(&self, _printer: &str) -> Result<PrinterState> {
        self.unavailable("printer_state")
    }

    async fn printer_state_messages(&self, _printer: &str) -> Result<Vec<String>> {
        self.unavailable("printer_state_messages")
    }

    async fn printer_error_state(&self, _printer: &str) -> Result<bool> {
        self.unavailable("printer_error_state")
    }

    async fn printer_details(&self, _printer: &str) -> Result<BTreeMap<String, String>> {
        self.unavailable("printer_details")
    }

    async fn set_advanced_option(
        &self,
        _printer: &str,
        _setting: AdvancedSetting,
        _enabled: bool,
    ) -> Result<()> {
        self.unavailable("set_advanced_option")
    }

    async fn delete_printer(&self, _printer: &str) -> Result<()> {
        self.unavailable("delete_printer")
    }

    async fn print_test_page(&self, _printer: &str) -> Result<()> {
        self.unavailable("print_test_page")
    }

    async fn job_status(&self, _job: &str) -> Result<Option<JobStatus>> {
        self.unavailable("job_status")
    }

    async fn job_state_message(&self, _job: &str) -> Result<Option<String>> {
        self.unavailable("job_state_message")
    }

    async fn pages_printed(&self, _job: &str) -> Result<u32> {
        self.unavailable("pages_printed")
    }

    async fn delete_job(&self, _job: &str) -> Result<()> {
        self.unavailable("delete_job")
    }

    async fn delete_jobs(&self, _job: &str) -> Result<usize> {
        self.unavailable("delete_jobs")
    }
}
