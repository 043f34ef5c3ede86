use crate::context::SuiteContext;
use crate::suite::{Suite, TestCase, Verdict};
use crate::suites::{observed_or_confirmed, unknown_case};
use async_trait::async_trait;
use logocert_cloudprint::{wait_for_printer_state, wait_for_state_cleared, wait_for_state_message};
use logocert_core::{CertError, PrinterState, Result, SuiteKind};

const PAPER_KEYWORDS: &[&str] = &["paper", "media"];
const COVER_KEYWORDS: &[&str] = &["cover", "door"];

const CASES: &[TestCase] = &[
    TestCase::new("online_idle", "Printer reports idle on the management page"),
    TestCase::new("out_of_paper", "Out of paper is reported with an error state"),
    TestCase::new("paper_reloaded", "Out of paper clears after reloading paper"),
    TestCase::new("cover_open", "Open cover is reported and clears once closed"),
    TestCase::new("offline", "Powered off printer shows offline, then idle again"),
];

pub struct PrinterStateSuite;

impl PrinterStateSuite {
    async fn online_idle(&self, ctx: &SuiteContext) -> Result<Verdict> {
        let idle = |s: &PrinterState| *s == PrinterState::Idle;
        match wait_for_printer_state(ctx.portal.as_ref(), ctx.printer(), idle, ctx.state_poll()).await {
            Ok(state) => Ok(Verdict::pass(format!("State {}", state))),
            Err(CertError::Timeout(msg)) => Ok(Verdict::blocking(msg)),
            Err(e) => Err(e),
        }
    }

    async fn out_of_paper(&self, ctx: &SuiteContext) -> Result<Verdict> {
        let printer = ctx.printer();
        ctx.prompter.pause("Remove all paper from the printer").await?;

        let observed = wait_for_state_message(ctx.portal.as_ref(), printer, PAPER_KEYWORDS, ctx.state_poll()).await;
        let question = "Does the management page report the printer out of paper?";
        let verdict = observed_or_confirmed(ctx, observed, question).await?;
        if !verdict.passed() {
            return Ok(verdict);
        }

        let flagged = ctx.portal.printer_error_state(printer).await?;
        Ok(Verdict::check(
            flagged,
            verdict.notes.clone(),
            format!("{}, but the printer is not flagged with an error", verdict.notes),
        ))
    }

    async fn paper_reloaded(&self, ctx: &SuiteContext) -> Result<Verdict> {
        ctx.prompter.pause("Reload paper into the printer").await?;
        let cleared = wait_for_state_cleared(ctx.portal.as_ref(), ctx.printer(), PAPER_KEYWORDS, ctx.state_poll())
            .await
            .map(|_| "Out of paper cleared".to_string());
        observed_or_confirmed(ctx, cleared, "Has the out of paper state cleared on the management page?").await
    }

    async fn cover_open(&self, ctx: &SuiteContext) -> Result<Verdict> {
        let printer = ctx.printer();
        ctx.prompter.pause("Open a cover or door on the printer").await?;
        let observed = wait_for_state_message(ctx.portal.as_ref(), printer, COVER_KEYWORDS, ctx.state_poll()).await;
        let question = "Does the management page report the open cover?";
        let opened = observed_or_confirmed(ctx, observed, question).await?;
        if !opened.passed() {
            return Ok(opened);
        }

        ctx.prompter.pause("Close the cover").await?;
        let cleared = wait_for_state_cleared(ctx.portal.as_ref(), printer, COVER_KEYWORDS, ctx.state_poll())
            .await
            .map(|_| format!("{}; cleared after closing", opened.notes));
        observed_or_confirmed(ctx, cleared, "Has the open cover state cleared?").await
    }

    async fn offline(&self, ctx: &SuiteContext) -> Result<Verdict> {
        let printer = ctx.printer();
        ctx.prompter.pause("Turn the printer off").await?;
        let is_offline = |s: &PrinterState| *s == PrinterState::Offline;
        let offline = wait_for_printer_state(ctx.portal.as_ref(), printer, is_offline, ctx.state_poll())
            .await
            .map(|state| format!("State {}", state));
        let question = "Does the management page show the printer offline?";
        let went_offline = observed_or_confirmed(ctx, offline, question).await?;
        if !went_offline.passed() {
            return Ok(went_offline);
        }

        ctx.prompter.pause("Turn the printer back on").await?;
        let back = wait_for_printer_state(ctx.portal.as_ref(), printer, |s| s.is_online(), ctx.state_poll())
            .await
            .map(|state| format!("{}; back online ({})", went_offline.notes, state));
        observed_or_confirmed(ctx, back, "Is the printer back online on the management page?").await
    }
}

#[async_trait]
impl Suite for PrinterStateSuite {
    fn kind(&self) -> SuiteKind {
        SuiteKind::PrinterState
    }

    fn cases(&self) -> &'static [TestCase] {
        CASES
    }

    async fn run_case(&self, case: &str, ctx: &SuiteContext) -> Result<Verdict> {
        match case {
            "online_idle" => self.online_idle(ctx).await,
            "out_of_paper" => self.out_of_paper(ctx).await,
            "paper_reloaded" => self.paper_reloaded(ctx).await,
            "cover_open" => self.cover_open(ctx).await,
            "offline" => self.offline(ctx).await,
            other => Err(unknown_case(self.kind(), other)),
        }
    }
}
