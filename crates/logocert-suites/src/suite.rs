//! Suites, cases and verdicts

use crate::context::SuiteContext;
use async_trait::async_trait;
use logocert_core::{Result, SuiteKind, TestOutcome};

/// Outcome of one case with operator-facing notes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub outcome: TestOutcome,
    pub notes: String,
    /// Later cases in the suite depend on this one and cannot run
    pub blocking: bool,
}

impl Verdict {
    fn new(outcome: TestOutcome, notes: impl Into<String>) -> Self {
        Self {
            outcome,
            notes: notes.into(),
            blocking: false,
        }
    }

    pub fn pass(notes: impl Into<String>) -> Self {
        Self::new(TestOutcome::Passed, notes)
    }

    pub fn fail(notes: impl Into<String>) -> Self {
        Self::new(TestOutcome::Failed, notes)
    }

    pub fn skip(notes: impl Into<String>) -> Self {
        Self::new(TestOutcome::Skipped, notes)
    }

    /// A failure that blocks the rest of the suite
    pub fn blocking(notes: impl Into<String>) -> Self {
        Self {
            blocking: true,
            ..Self::fail(notes)
        }
    }

    /// Pass or fail on `condition`
    pub fn check(condition: bool, pass_notes: impl Into<String>, fail_notes: impl Into<String>) -> Self {
        if condition {
            Self::pass(pass_notes)
        } else {
            Self::fail(fail_notes)
        }
    }

    /// Make a failed verdict block the rest of the suite
    pub fn or_block(mut self) -> Self {
        self.blocking = self.outcome == TestOutcome::Failed;
        self
    }

    pub fn passed(&self) -> bool {
        self.outcome == TestOutcome::Passed
    }
}

/// A named case within a suite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestCase {
    pub name: &'static str,
    pub description: &'static str,
}

impl TestCase {
    pub const fn new(name: &'static str, description: &'static str) -> Self {
        Self { name, description }
    }
}

/// A group of cases for one functional area, run in order
#[async_trait]
pub trait Suite: Send + Sync {
    fn kind(&self) -> SuiteKind;

    fn cases(&self) -> &'static [TestCase];

    /// Run a single case by name
    ///
    /// Errors are recorded as failures by the runner, with the error as notes.
    async fn run_case(&self, case: &str, ctx: &SuiteContext) -> Result<Verdict>;
}
