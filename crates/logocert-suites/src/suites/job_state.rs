use crate::context::SuiteContext;
use crate::suite::{Suite, TestCase, Verdict};
use crate::suites::{observed_or_confirmed, unknown_case};
use async_trait::async_trait;
use logocert_cloudprint::{wait_for_job_status, wait_for_state_cleared, wait_for_state_message};
use logocert_core::{CertError, JobStatus, Result, SuiteKind};
use tracing::{debug, warn};

const PAPER_KEYWORDS: &[&str] = &["paper", "media"];

const CASES: &[TestCase] = &[
    TestCase::new("print_test_page", "Job printed from the web dialog reaches Printed"),
    TestCase::new("pages_printed", "Job details report the pages printed"),
    TestCase::new("operator_verifies_output", "Operator confirms the printout is correct"),
    TestCase::new("job_resumes_after_out_of_paper", "Job waits out of paper and prints after reloading"),
    TestCase::new("delete_job", "Job can be deleted from the job list"),
];

pub struct JobStateSuite;

impl JobStateSuite {
    /// Submit the test page and wait for the job to finish
    async fn print_and_wait(&self, ctx: &SuiteContext) -> Result<Verdict> {
        let document = ctx.test_document();
        ctx.portal.print_test_page(ctx.printer()).await?;

        match wait_for_job_status(ctx.portal.as_ref(), document, |s| *s == JobStatus::Printed, ctx.job_poll()).await {
            Ok(JobStatus::Printed) => Ok(Verdict::pass(format!("'{}' printed", document))),
            Ok(other) => {
                let cause = ctx.portal.job_state_message(document).await.ok().flatten();
                Ok(Verdict::fail(match cause {
                    Some(cause) => format!("Job ended {}: {}", other, cause),
                    None => format!("Job ended {}", other),
                }))
            }
            Err(CertError::Timeout(msg)) => Ok(Verdict::fail(msg)),
            Err(e) => Err(e),
        }
    }

    async fn pages_printed(&self, ctx: &SuiteContext) -> Result<Verdict> {
        let pages = ctx.portal.pages_printed(ctx.test_document()).await?;
        Ok(Verdict::check(
            pages >= 1,
            format!("{} page(s) printed", pages),
            "Job details report 0 pages printed",
        ))
    }

    async fn operator_verifies(&self, ctx: &SuiteContext) -> Result<Verdict> {
        let ok = ctx
            .prompter
            .confirm("Did the test page print completely and legibly?")
            .await?;
        Ok(Verdict::check(ok, "Operator verified output", "Operator rejected the printout"))
    }

    async fn resumes_after_out_of_paper(&self, ctx: &SuiteContext) -> Result<Verdict> {
        let printer = ctx.printer();
        let document = ctx.test_document();

        // Jobs are looked up by title, so earlier test pages would shadow the new one
        let cleared = ctx.portal.delete_jobs(document).await?;
        debug!("Removed {} earlier '{}' job(s)", cleared, document);

        ctx.prompter.pause("Remove all paper from the printer").await?;
        ctx.portal.print_test_page(printer).await?;

        let observed = wait_for_state_message(ctx.portal.as_ref(), printer, PAPER_KEYWORDS, ctx.state_poll()).await;
        let question = "Does the management page report the printer out of paper?";
        let stalled = observed_or_confirmed(ctx, observed, question).await?;
        if !stalled.passed() {
            return Ok(stalled);
        }

        match wait_for_job_status(ctx.portal.as_ref(), document, |s| !s.is_terminal(), ctx.job_poll()).await {
            Ok(status) if status.is_terminal() => {
                return Ok(Verdict::fail(format!(
                    "Job ended {} while the printer was out of paper",
                    status
                )));
            }
            Ok(status) => debug!("Job {} while out of paper", status),
            Err(CertError::Timeout(msg)) => return Ok(Verdict::fail(msg)),
            Err(e) => return Err(e),
        }

        ctx.prompter.pause("Reload paper into the printer").await?;
        if let Err(e) = wait_for_state_cleared(ctx.portal.as_ref(), printer, PAPER_KEYWORDS, ctx.state_poll()).await {
            warn!("Out of paper state did not clear: {}", e);
        }

        let verdict = self.print_status(ctx).await?;
        Ok(Verdict {
            notes: format!("{}; {}", stalled.notes, verdict.notes),
            ..verdict
        })
    }

    /// Wait on the pending test page job without submitting another
    async fn print_status(&self, ctx: &SuiteContext) -> Result<Verdict> {
        let document = ctx.test_document();
        match wait_for_job_status(ctx.portal.as_ref(), document, |s| *s == JobStatus::Printed, ctx.job_poll()).await {
            Ok(JobStatus::Printed) => Ok(Verdict::pass("Job resumed and printed")),
            Ok(other) => Ok(Verdict::fail(format!("Job ended {}", other))),
            Err(CertError::Timeout(msg)) => Ok(Verdict::fail(msg)),
            Err(e) => Err(e),
        }
    }

    async fn delete_job(&self, ctx: &SuiteContext) -> Result<Verdict> {
        ctx.portal.delete_job(ctx.test_document()).await?;
        Ok(Verdict::pass(format!("Deleted '{}'", ctx.test_document())))
    }
}

#[async_trait]
impl Suite for JobStateSuite {
    fn kind(&self) -> SuiteKind {
        SuiteKind::JobState
    }

    fn cases(&self) -> &'static [TestCase] {
        CASES
    }

    async fn run_case(&self, case: &str, ctx: &SuiteContext) -> Result<Verdict> {
        match case {
            "print_test_page" => Ok(self.print_and_wait(ctx).await?.or_block()),
            "pages_printed" => self.pages_printed(ctx).await,
            "operator_verifies_output" => self.operator_verifies(ctx).await,
            "job_resumes_after_out_of_paper" => self.resumes_after_out_of_paper(ctx).await,
            "delete_job" => self.delete_job(ctx).await,
            other => Err(unknown_case(self.kind(), other)),
        }
    }
}
