//! Cloud Print management and simulate page automation
//!
//! Printers and jobs are addressed by name, or by any unique part of it, the
//! same way a tester would pick them out of the dashboard lists.

use logocert_browser::{aria_state, verify_page_loaded, wait_for_text, BrowserSession, Locator, PageElement};
use logocert_core::config::GcpConfig;
use logocert_core::fail_open::retry;
use logocert_core::{CertError, JobStatus, PrinterState, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, warn};

// Dashboard
const SELECTED_ITEM: &str = "cp-dashboard-listitem-selected";
const PRINTER_NAME: &str = "cp-dashboard-printer-name";
const ACTION_BAR: &str = "cp-dashboard-actionbar-main";
const ERROR_STATE_ICON: &str = "cp-error-state-icon";
const JOB_NAME: &str = "cp-job-name";
const STATUS_MSG: &str = "cp-status-msg";
const DELETE_BUTTON: &str = "cp-button-delete";
const DETAILS_BUTTON: &str = "cp-button-details";

// Printer details
const DETAILS_PRINTER_NAME: &str = "cp-printerdetailscontent-printer-name";
const DETAILS_BASIC: &str = "cp-printerdetailscontent-basic";
const DETAILS_STATE: &str = "cp-printerdetailscontent-state";
const STATE_MESSAGE: &str = "cp-printer-state-message";
const SETTINGS_BUTTON: &str = "cp-printerdetailscontent-settings-button";
const ADVANCED_BUTTON: &str = "cp-printerdetailscontent-advanced-button";
const ADVANCED_CONTAINER: &str = "cp-printerdetailscontent-advanced-container";
const INFO_LABEL: &str = "cp-info-label";
const INFO_VALUE: &str = "cp-info-value";
const CHECKBOX: &str = "jfk-checkbox";
const SAVE_CHANGES: &str = "cp-printersettings-save-changes";

// Job details
const JOB_STATE_CAUSE: &str = "cp-jobdetailscontent-state-cause-message";

// Simulate page and print dialog
const PRINT_GADGET: &str = "cloudprint_gadget_document";
const GADGET_BUTTON: &str = "__gcp_button_img_cls";
const DIALOG_IFRAME: &str = "iframe.__gcp_dialog_iframe_cls";
const DIALOG_PRINTER_NAME: &str = "cp-printdialog-printer-name";
const DIALOG_CONTROLS: &str = "cp-printdialog-printwidget-controls";
const UPDATE_PRINTER_ID: &str = "update_printerid";
const UPDATE_SUBMIT: &str = "update_submit";

/// Upper bound on deletions when clearing jobs that share a title
const MAX_JOB_DELETIONS: usize = 20;

/// Page interactions are retried this many times
const PAGE_RETRIES: usize = 3;
const PAGE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Advanced printer settings that can be toggled from the details page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdvancedSetting {
    LocalDiscovery,
    LocalPrinting,
    ConversionPrinting,
}

impl AdvancedSetting {
    /// Class of the settings row holding this option's checkbox
    pub fn row_class(&self) -> &'static str {
        match self {
            Self::LocalDiscovery => "cp-printersettings-local-discovery-row",
            Self::LocalPrinting => "cp-printersettings-local-printing-row",
            Self::ConversionPrinting => "cp-printersettings-conversion-printing-row",
        }
    }
}

impl std::fmt::Display for AdvancedSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocalDiscovery => write!(f, "local_discovery"),
            Self::LocalPrinting => write!(f, "local_printing"),
            Self::ConversionPrinting => write!(f, "conversion"),
        }
    }
}

impl std::str::FromStr for AdvancedSetting {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local_discovery" => Ok(Self::LocalDiscovery),
            "local_printing" => Ok(Self::LocalPrinting),
            "conversion" | "conversion_printing" => Ok(Self::ConversionPrinting),
            _ => Err(format!(
                "Unknown setting '{}', use one of: local_discovery, local_printing, conversion",
                s
            )),
        }
    }
}

/// Options accepted by the simulate page UPDATE form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOption {
    LocalSettings,
}

impl UpdateOption {
    fn input_id(&self) -> &'static str {
        match self {
            Self::LocalSettings => "update_local_settings",
        }
    }
}

impl std::fmt::Display for UpdateOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocalSettings => write!(f, "local_settings"),
        }
    }
}

impl std::str::FromStr for UpdateOption {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "local_settings" => Ok(Self::LocalSettings),
            _ => Err(format!("Unknown update option '{}', use: local_settings", s)),
        }
    }
}

/// Drives the Cloud Print management and simulate pages
#[derive(Clone)]
pub struct CloudPrintManager {
    session: Arc<BrowserSession>,
    urls: GcpConfig,
}

impl CloudPrintManager {
    pub fn new(session: Arc<BrowserSession>, urls: GcpConfig) -> Self {
        Self { session, urls }
    }

    pub fn session(&self) -> &Arc<BrowserSession> {
        &self.session
    }

    /// Navigate to one of the Cloud Print pages, failing on error pages
    async fn open_page(&self, url: &str) -> Result<()> {
        self.session.navigate(url).await?;
        if !verify_page_loaded(&self.session).await? {
            let title = self.session.title().await.unwrap_or_default();
            return Err(CertError::Navigation(format!("{} did not load (title '{}')", url, title)));
        }
        Ok(())
    }

    /// The currently selected dashboard list item, if any
    async fn selected_item(&self) -> Option<PageElement> {
        self.session.find(&Locator::class(SELECTED_ITEM)).await.ok()
    }

    /// Select a registered printer from the printers list
    pub async fn select_printer(&self, printer: &str) -> Result<()> {
        self.open_page(&self.urls.printers_url).await?;

        if let Some(selected) = self.selected_item().await {
            let names = self
                .session
                .find_all_in(&selected.path, &Locator::class(PRINTER_NAME))
                .await?;
            if names.iter().any(|p| p.text.contains(printer)) {
                debug!("Printer '{}' already selected", printer);
                return Ok(());
            }
        }

        for candidate in self.session.find_all(&Locator::class(PRINTER_NAME)).await? {
            if candidate.text.contains(printer) {
                self.session.click(&candidate).await?;
                return Ok(());
            }
        }
        Err(CertError::not_found(format!("printer '{}'", printer)))
    }

    async fn open_printer_details_once(&self, printer: &str) -> Result<()> {
        self.select_printer(printer).await?;
        let action_bar = self.session.find(&Locator::class(ACTION_BAR)).await?;
        let buttons = self
            .session
            .find_all_in(&action_bar.path, &Locator::xpath(".//*[contains(text(), 'Details')]"))
            .await?;
        let details = buttons
            .into_iter()
            .find(|b| b.text.contains("Details"))
            .ok_or_else(|| CertError::not_found("printer Details button"))?;
        self.session.click(&details).await
    }

    /// Open the printer details page
    pub async fn open_printer_details(&self, printer: &str) -> Result<()> {
        retry("open_printer_details", PAGE_RETRIES, PAGE_RETRY_DELAY, || {
            self.open_printer_details_once(printer)
        })
        .await
    }

    async fn toggle_printer_advanced_settings_once(&self, printer: &str, expand: bool) -> Result<()> {
        self.open_printer_details_once(printer).await?;
        let button = self.session.find(&Locator::class(SETTINGS_BUTTON)).await?;
        if aria_state(&self.session, &button, "aria-expanded").await? == expand {
            return Ok(());
        }
        self.session.click(&button).await
    }

    /// Expand (or collapse) the advanced settings section of a printer
    pub async fn toggle_printer_advanced_settings(&self, printer: &str, expand: bool) -> Result<()> {
        retry("toggle_printer_advanced_settings", PAGE_RETRIES, PAGE_RETRY_DELAY, || {
            self.toggle_printer_advanced_settings_once(printer, expand)
        })
        .await
    }

    async fn toggle_advanced_option_once(
        &self,
        printer: &str,
        setting: AdvancedSetting,
        enabled: bool,
    ) -> Result<()> {
        self.toggle_printer_advanced_settings_once(printer, true).await?;
        let row = self.session.find(&Locator::class(setting.row_class())).await?;
        let checkbox = self.session.find_in(&row.path, &Locator::class(CHECKBOX)).await?;
        if aria_state(&self.session, &checkbox, "aria-checked").await? == enabled {
            debug!("{} already {}", setting, if enabled { "enabled" } else { "disabled" });
            return Ok(());
        }
        self.session.click(&checkbox).await?;
        let save = self.session.find(&Locator::class(SAVE_CHANGES)).await?;
        self.session.click(&save).await?;
        info!("Set {} = {} on '{}'", setting, enabled, printer);
        Ok(())
    }

    /// Check or uncheck an advanced setting and save the change
    pub async fn toggle_advanced_option(
        &self,
        printer: &str,
        setting: AdvancedSetting,
        enabled: bool,
    ) -> Result<()> {
        retry("toggle_advanced_option", PAGE_RETRIES, PAGE_RETRY_DELAY, || {
            self.toggle_advanced_option_once(printer, setting, enabled)
        })
        .await
    }

    /// Printer name as shown on the details page
    pub async fn printer_name(&self, printer: &str) -> Result<String> {
        retry("printer_name", PAGE_RETRIES, PAGE_RETRY_DELAY, || async move {
            self.open_printer_details_once(printer).await?;
            Ok(self.session.find(&Locator::class(DETAILS_PRINTER_NAME)).await?.text)
        })
        .await
    }

    /// Raw basic state message of a printer
    pub async fn printer_state_text(&self, printer: &str) -> Result<String> {
        retry("printer_state", PAGE_RETRIES, PAGE_RETRY_DELAY, || async move {
            self.open_printer_details_once(printer).await?;
            let basic = self.session.find(&Locator::class(DETAILS_BASIC)).await?;
            Ok(self
                .session
                .find_in(&basic.path, &Locator::class(STATE_MESSAGE))
                .await?
                .text)
        })
        .await
    }

    /// Current basic state of a printer
    pub async fn printer_state(&self, printer: &str) -> Result<PrinterState> {
        Ok(PrinterState::parse(&self.printer_state_text(printer).await?))
    }

    /// Whether the dashboard shows the error icon for a printer
    pub async fn printer_error_state(&self, printer: &str) -> Result<bool> {
        retry("printer_error_state", PAGE_RETRIES, PAGE_RETRY_DELAY, || async move {
            self.select_printer(printer).await?;
            let selected = self
                .selected_item()
                .await
                .ok_or_else(|| CertError::not_found(format!("selected printer '{}'", printer)))?;
            let icons = self
                .session
                .find_all_in(&selected.path, &Locator::class(ERROR_STATE_ICON))
                .await?;
            Ok(!icons.is_empty())
        })
        .await
    }

    /// All detailed state messages of a printer, possibly empty
    pub async fn printer_state_messages(&self, printer: &str) -> Result<Vec<String>> {
        retry("printer_state_messages", PAGE_RETRIES, PAGE_RETRY_DELAY, || async move {
            self.open_printer_details_once(printer).await?;
            let state = self.session.find(&Locator::class(DETAILS_STATE)).await?;
            let messages = self
                .session
                .find_all_in(&state.path, &Locator::class(STATE_MESSAGE))
                .await?;
            if messages.is_empty() {
                debug!("No printer state messages for '{}'", printer);
            }
            Ok(messages.into_iter().map(|m| m.text).collect())
        })
        .await
    }

    /// Expand (or collapse) the advanced details of the open printer
    pub async fn toggle_printer_advanced_details(&self, expand: bool) -> Result<()> {
        let button = self.session.find(&Locator::class(ADVANCED_BUTTON)).await?;
        if aria_state(&self.session, &button, "aria-expanded").await? == expand {
            return Ok(());
        }
        self.session.click(&button).await
    }

    /// Advanced details of a printer as label -> value
    pub async fn printer_details(&self, printer: &str) -> Result<BTreeMap<String, String>> {
        retry("printer_details", PAGE_RETRIES, PAGE_RETRY_DELAY, || async move {
            self.open_printer_details_once(printer).await?;
            // The details pane animates in; toggling too early is ignored.
            tokio::time::sleep(Duration::from_secs(2)).await;
            self.toggle_printer_advanced_details(true).await?;
            tokio::time::sleep(Duration::from_secs(2)).await;

            let container = self.session.find(&Locator::class(ADVANCED_CONTAINER)).await?;
            let labels = self
                .session
                .find_all_in(&container.path, &Locator::class(INFO_LABEL))
                .await?;
            let values = self
                .session
                .find_all_in(&container.path, &Locator::class(INFO_VALUE))
                .await?;
            if labels.is_empty() || values.is_empty() {
                return Err(CertError::not_found(INFO_VALUE));
            }
            Ok(labels
                .into_iter()
                .zip(values)
                .map(|(label, value)| (label.text, value.text))
                .collect())
        })
        .await
    }

    /// Delete a registered printer
    pub async fn delete_printer(&self, printer: &str) -> Result<()> {
        self.select_printer(printer).await?;
        let delete = self
            .session
            .find_all(&Locator::name(DELETE_BUTTON))
            .await?
            .into_iter()
            .find(|b| b.text.contains("Delete"))
            .ok_or_else(|| CertError::not_found("printer Delete button"))?;
        self.session.click(&delete).await?;

        let confirm = self.session.wait_for(&Locator::name("ok"), None).await?;
        self.session.click(&confirm).await?;
        info!("Deleted printer '{}'", printer);
        Ok(())
    }

    /// Submit the UPDATE form on the simulate page
    pub async fn update_printer_with_update_api(
        &self,
        printer_id: &str,
        option: UpdateOption,
        value: &str,
    ) -> Result<()> {
        self.open_page(&self.urls.simulate_url).await?;

        let id_field = self.session.find(&Locator::id(UPDATE_PRINTER_ID)).await?;
        self.session.send_keys(&id_field, printer_id).await?;
        let option_field = self.session.find(&Locator::id(option.input_id())).await?;
        self.session.send_keys(&option_field, value).await?;
        let submit = self.session.find(&Locator::id(UPDATE_SUBMIT)).await?;
        self.session.click(&submit).await
    }

    /// Open the web print dialog through the simulate page print gadget
    pub async fn open_web_print_dialog(&self) -> Result<()> {
        self.open_page(&self.urls.simulate_url).await?;
        let gadget = self.session.find(&Locator::id(PRINT_GADGET)).await?;
        let button = self
            .session
            .find_in(&gadget.path, &Locator::class(GADGET_BUTTON))
            .await?;
        self.session.click(&button).await
    }

    /// Print the simulate page document to `printer` from the web print dialog
    pub async fn print_from_web_dialog(&self, printer: &str) -> Result<()> {
        self.open_web_print_dialog().await?;
        self.session.wait_for(&Locator::css(DIALOG_IFRAME), None).await?;
        self.session.switch_to_frame(&Locator::css(DIALOG_IFRAME)).await?;

        let result = self.print_in_dialog(printer).await;
        self.session.switch_to_default_content();
        result
    }

    async fn print_in_dialog(&self, printer: &str) -> Result<()> {
        let candidate = wait_for_text(
            &self.session,
            &Locator::class(DIALOG_PRINTER_NAME),
            printer,
            self.session.default_timeout(),
        )
        .await
        .map_err(|e| {
            warn!("Printer '{}' not found in web print dialog: {}", printer, e);
            CertError::not_found(format!("printer '{}' in print dialog", printer))
        })?;
        self.session.click(&candidate).await?;

        let controls = self.session.find(&Locator::class(DIALOG_CONTROLS)).await?;
        let print = self
            .session
            .find_in(&controls.path, &Locator::name("print"))
            .await?;
        self.session.click(&print).await?;
        info!("Submitted print job to '{}' from web dialog", printer);
        Ok(())
    }

    async fn select_job_once(&self, job: &str) -> Result<PageElement> {
        self.open_page(&self.urls.jobs_url).await?;

        if let Some(selected) = self.selected_item().await {
            let names = self
                .session
                .find_all_in(&selected.path, &Locator::class(JOB_NAME))
                .await?;
            if names.iter().any(|j| j.text.contains(job)) {
                return Ok(selected);
            }
        }

        let candidate = self
            .session
            .find_all(&Locator::class(JOB_NAME))
            .await?
            .into_iter()
            .find(|j| j.text.contains(job))
            .ok_or_else(|| CertError::not_found(format!("job '{}'", job)))?;
        self.session.click(&candidate).await?;
        self.selected_item()
            .await
            .ok_or_else(|| CertError::not_found(format!("selected job '{}'", job)))
    }

    /// Select a print job in the jobs list
    pub async fn select_job(&self, job: &str) -> Result<()> {
        retry("select_job", PAGE_RETRIES, PAGE_RETRY_DELAY, || async move {
            self.select_job_once(job).await.map(|_| ())
        })
        .await
    }

    async fn delete_job_once(&self, job: &str) -> Result<()> {
        self.select_job_once(job).await?;
        let delete = self.session.find(&Locator::name(DELETE_BUTTON)).await?;
        self.session.click(&delete).await
    }

    /// Delete a print job
    pub async fn delete_job(&self, job: &str) -> Result<()> {
        retry("delete_job", PAGE_RETRIES, PAGE_RETRY_DELAY, || self.delete_job_once(job)).await
    }

    /// Whether any job in the jobs list matches `job`
    async fn job_listed(&self, job: &str) -> Result<bool> {
        self.open_page(&self.urls.jobs_url).await?;
        let names = self.session.find_all(&Locator::class(JOB_NAME)).await?;
        Ok(names.iter().any(|j| j.text.contains(job)))
    }

    /// Delete every listed job matching `job`, returning how many were removed
    pub async fn delete_jobs(&self, job: &str) -> Result<usize> {
        let mut deleted = 0;
        while self.job_listed(job).await? {
            if deleted == MAX_JOB_DELETIONS {
                return Err(CertError::Other(format!(
                    "Jobs matching '{}' still listed after {} deletions",
                    job, deleted
                )));
            }
            self.delete_job(job).await?;
            deleted += 1;
        }
        if deleted > 0 {
            info!("Deleted {} earlier job(s) matching '{}'", deleted, job);
        }
        Ok(deleted)
    }

    async fn open_job_details_once(&self, job: &str) -> Result<()> {
        self.select_job_once(job).await?;
        let details = self.session.find(&Locator::name(DETAILS_BUTTON)).await?;
        self.session.click(&details).await
    }

    /// Open the details page of a print job
    pub async fn open_job_details(&self, job: &str) -> Result<()> {
        retry("open_job_details", PAGE_RETRIES, PAGE_RETRY_DELAY, || {
            self.open_job_details_once(job)
        })
        .await
    }

    /// Status of a job, `None` when the job is not listed
    pub async fn job_status(&self, job: &str) -> Result<Option<JobStatus>> {
        let found = retry("job_status", PAGE_RETRIES, PAGE_RETRY_DELAY, || async move {
            let selected = self.select_job_once(job).await?;
            let status = self
                .session
                .find_in(&selected.path, &Locator::class(STATUS_MSG))
                .await?;
            Ok(JobStatus::parse(&status.text))
        })
        .await;

        match found {
            Ok(status) => Ok(Some(status)),
            Err(CertError::ElementNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// State cause message from the job details page, if one is shown
    pub async fn job_details_state_message(&self, job: &str) -> Result<Option<String>> {
        self.open_job_details(job).await?;
        match self.session.find(&Locator::class(JOB_STATE_CAUSE)).await {
            Ok(message) => Ok(Some(message.text)),
            Err(CertError::ElementNotFound { .. }) => {
                info!("No state cause message for job '{}'", job);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Pages printed for a job; 0 unless the job reached Printed
    pub async fn pages_printed(&self, job: &str) -> Result<u32> {
        match self.job_status(job).await? {
            Some(JobStatus::Printed) => {}
            other => {
                warn!("Job '{}' not printed (status: {:?})", job, other);
                return Ok(0);
            }
        }

        self.open_job_details(job).await?;
        let line = self
            .session
            .find(&Locator::text("Pages printed"))
            .await?;
        parse_pages_printed(&line.text)
            .ok_or_else(|| CertError::Other(format!("Unparseable page count: '{}'", line.text)))
    }
}

fn pages_printed_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Pages printed\s*:\s*(\d+)").expect("valid pages printed pattern"))
}

/// Extract the count from a "Pages printed: N" line
pub fn parse_pages_printed(text: &str) -> Option<u32> {
    pages_printed_regex()
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pages_printed() {
        assert_eq!(parse_pages_printed("Pages printed: 3"), Some(3));
        assert_eq!(parse_pages_printed("Pages printed:12 of 12"), Some(12));
        assert_eq!(parse_pages_printed("Pages printed: -"), None);
        assert_eq!(parse_pages_printed("Copies: 2"), None);
    }

    #[test]
    fn test_advanced_setting_from_str() {
        assert_eq!(
            "local_discovery".parse::<AdvancedSetting>().unwrap(),
            AdvancedSetting::LocalDiscovery
        );
        assert_eq!(
            "conversion".parse::<AdvancedSetting>().unwrap(),
            AdvancedSetting::ConversionPrinting
        );
        let err = "duplex".parse::<AdvancedSetting>().unwrap_err();
        assert!(err.contains("local_printing"));
    }

    #[test]
    fn test_setting_rows() {
        assert_eq!(
            AdvancedSetting::LocalPrinting.row_class(),
            "cp-printersettings-local-printing-row"
        );
        assert_eq!(UpdateOption::LocalSettings.input_id(), "update_local_settings");
    }

    #[test]
    fn test_parse_update_option() {
        assert_eq!(
            "local-settings".parse::<UpdateOption>().unwrap(),
            UpdateOption::LocalSettings
        );
        assert_eq!(UpdateOption::LocalSettings.to_string(), "local_settings");
        assert!("semantic_state".parse::<UpdateOption>().is_err());
    }
}
