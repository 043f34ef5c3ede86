//! Runs suites in order and records every case

use crate::context::SuiteContext;
use crate::recorder::ResultRecorder;
use crate::suite::{Suite, Verdict};
use crate::suites::default_suites;
use logocert_browser::capture_screenshot;
use logocert_core::fail_open::fail_open;
use logocert_core::{RunSummary, SuiteKind, TestOutcome, TestRecord};
use tracing::{error, info};

pub struct CertRunner {
    ctx: SuiteContext,
    recorder: ResultRecorder,
    suites: Vec<Box<dyn Suite>>,
}

impl CertRunner {
    /// Runner with the standard certification suites
    pub fn new(ctx: SuiteContext, recorder: ResultRecorder) -> Self {
        Self::with_suites(ctx, recorder, default_suites())
    }

    pub fn with_suites(ctx: SuiteContext, recorder: ResultRecorder, suites: Vec<Box<dyn Suite>>) -> Self {
        Self { ctx, recorder, suites }
    }

    pub fn context(&self) -> &SuiteContext {
        &self.ctx
    }

    pub fn recorder(&self) -> &ResultRecorder {
        &self.recorder
    }

    /// Run the `selected` suites in the order given
    pub async fn run(&self, selected: &[SuiteKind]) -> RunSummary {
        let mut summary = RunSummary::default();
        self.recorder.start_run(&self.ctx.config.device).await;

        for kind in selected {
            match self.suites.iter().find(|s| s.kind() == *kind) {
                Some(suite) => self.run_suite(suite.as_ref(), &mut summary).await,
                None => error!("No implementation for suite {}", kind),
            }
        }

        self.recorder.finish_run(&summary).await;
        info!("Certification run complete: {}", summary);
        summary
    }

    async fn run_suite(&self, suite: &dyn Suite, summary: &mut RunSummary) {
        let kind = suite.kind();
        info!("=== {} ===", kind.display_name());
        let mut blocked_by: Option<&str> = None;

        for case in suite.cases() {
            let verdict = match blocked_by {
                Some(blocker) => Verdict {
                    outcome: TestOutcome::Blocked,
                    notes: format!("Blocked by failed case '{}'", blocker),
                    blocking: false,
                },
                None => {
                    info!("Running {} / {}: {}", kind.display_name(), case.name, case.description);
                    match suite.run_case(case.name, &self.ctx).await {
                        Ok(verdict) => verdict,
                        Err(e) => Verdict::fail(format!("Error: {}", e)),
                    }
                }
            };

            if verdict.blocking {
                blocked_by = Some(case.name);
            }

            let mut notes = verdict.notes;
            if verdict.outcome == TestOutcome::Failed {
                if let Some(path) = self.screenshot(kind, case.name).await {
                    notes = format!("{} (screenshot: {})", notes, path);
                }
            }

            summary.record(verdict.outcome);
            self.recorder
                .record(TestRecord::new(kind, case.name, verdict.outcome, notes))
                .await;
        }
    }

    /// Screenshot of the browser after a failure, when enabled
    async fn screenshot(&self, kind: SuiteKind, case: &str) -> Option<String> {
        if !self.ctx.config.output.screenshots_on_failure {
            return None;
        }
        let browser = self.ctx.browser.as_ref()?;
        let dir = self.ctx.config.screenshot_dir();
        let name = format!("{}-{}", kind, case);
        fail_open("runner::screenshot", || capture_screenshot(browser, &dir, &name))
            .await
            .map(|path| path.display().to_string())
    }
}
