//! Polling printer and job state until an expected state shows up
//!
//! Printers and the Cloud Print service update state asynchronously, often
//! tens of seconds after the action that caused it. Every check that waits on
//! a state goes through [`poll_until`]: fetch, compare, sleep, until the
//! deadline. Fetch errors are treated as transient (pages are flaky) and only
//! surface if the deadline passes without a match.

use crate::portal::CloudPrintPortal;
use logocert_core::config::Timeouts;
use logocert_core::{CertError, JobStatus, PrinterState, Result};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Interval and deadline for one wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollSettings {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Settings for waiting on print jobs
    pub fn for_jobs(timeouts: &Timeouts) -> Self {
        Self::new(timeouts.poll_interval(), timeouts.job())
    }

    /// Settings for waiting on printer state changes
    pub fn for_printer_state(timeouts: &Timeouts) -> Self {
        Self::new(timeouts.poll_interval(), timeouts.printer_state())
    }
}

/// Poll `fetch` until `accept` returns true for an observed value
///
/// `fetch` returning `Ok(None)` means "nothing to observe yet" and keeps
/// polling. Each change in the observed value is logged once.
pub async fn poll_until<T, F, Fut, A>(
    label: &str,
    settings: PollSettings,
    mut fetch: F,
    mut accept: A,
) -> Result<T>
where
    T: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
    A: FnMut(&T) -> bool,
{
    let deadline = Instant::now() + settings.timeout;
    let mut last_seen: Option<String> = None;
    let mut last_error: Option<CertError> = None;

    loop {
        match fetch().await {
            Ok(Some(value)) => {
                let rendered = value.to_string();
                if last_seen.as_deref() != Some(rendered.as_str()) {
                    info!("{}: {}", label, rendered);
                    last_seen = Some(rendered);
                }
                if accept(&value) {
                    return Ok(value);
                }
            }
            Ok(None) => debug!("{}: nothing observed yet", label),
            Err(e) => {
                warn!("{}: poll failed: {}", label, e);
                last_error = Some(e);
            }
        }

        if Instant::now() + settings.interval > deadline {
            let detail = match (last_seen, last_error) {
                (Some(seen), _) => format!("last observed '{}'", seen),
                (None, Some(e)) => format!("last error: {}", e),
                (None, None) => "nothing observed".to_string(),
            };
            return Err(CertError::Timeout(format!(
                "{} after {:?} ({})",
                label, settings.timeout, detail
            )));
        }
        tokio::time::sleep(settings.interval).await;
    }
}

/// Wait for a job to reach a status matching `target`
///
/// Returns early with the observed status if the job reaches a terminal status
/// that does not match, so callers can report what actually happened.
pub async fn wait_for_job_status<P>(
    portal: &dyn CloudPrintPortal,
    job: &str,
    mut target: P,
    settings: PollSettings,
) -> Result<JobStatus>
where
    P: FnMut(&JobStatus) -> bool,
{
    poll_until(
        &format!("job '{}'", job),
        settings,
        || portal.job_status(job),
        |status| target(status) || status.is_terminal(),
    )
    .await
}

/// Wait for a printer's basic state to satisfy `target`
pub async fn wait_for_printer_state<P>(
    portal: &dyn CloudPrintPortal,
    printer: &str,
    target: P,
    settings: PollSettings,
) -> Result<PrinterState>
where
    P: FnMut(&PrinterState) -> bool,
{
    poll_until(
        &format!("printer '{}' state", printer),
        settings,
        || async move { portal.printer_state(printer).await.map(Some) },
        target,
    )
    .await
}

/// Whether any message mentions any keyword, ignoring case
pub fn mentions_any(messages: &[String], keywords: &[&str]) -> bool {
    messages.iter().any(|m| mentions(m, keywords))
}

fn mentions(text: &str, keywords: &[&str]) -> bool {
    let lower = text.to_lowercase();
    keywords.iter().any(|k| lower.contains(&k.to_lowercase()))
}

/// Wait for a printer state message mentioning one of `keywords`
pub async fn wait_for_state_message(
    portal: &dyn CloudPrintPortal,
    printer: &str,
    keywords: &[&str],
    settings: PollSettings,
) -> Result<String> {
    poll_until(
        &format!("printer '{}' messages", printer),
        settings,
        || async move {
            let messages = portal.printer_state_messages(printer).await?;
            Ok(Some(messages.join("; ")))
        },
        |joined| mentions(joined, keywords),
    )
    .await
}

/// Wait until no printer state message mentions any of `keywords`
pub async fn wait_for_state_cleared(
    portal: &dyn CloudPrintPortal,
    printer: &str,
    keywords: &[&str],
    settings: PollSettings,
) -> Result<()> {
    poll_until(
        &format!("printer '{}' messages", printer),
        settings,
        || async move {
            let messages = portal.printer_state_messages(printer).await?;
            Ok(Some(messages.join("; ")))
        },
        |joined| !mentions(joined, keywords),
    )
    .await
    .map(|_| ())
}
