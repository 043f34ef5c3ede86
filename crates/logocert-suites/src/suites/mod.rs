//! The certification suites

mod discovery;
mod job_state;
mod local_settings;
mod printer_state;
mod privet;
mod registration;

pub use discovery::DiscoverySuite;
pub use job_state::JobStateSuite;
pub use local_settings::LocalSettingsSuite;
pub use printer_state::PrinterStateSuite;
pub use privet::PrivetSuite;
pub use registration::RegistrationSuite;

use crate::context::SuiteContext;
use crate::suite::{Suite, Verdict};
use logocert_core::{CertError, Result, SuiteKind};

/// One instance of every suite
pub fn default_suites() -> Vec<Box<dyn Suite>> {
    SuiteKind::all().into_iter().map(suite_for).collect()
}

pub fn suite_for(kind: SuiteKind) -> Box<dyn Suite> {
    match kind {
        SuiteKind::Discovery => Box::new(DiscoverySuite),
        SuiteKind::Privet => Box::new(PrivetSuite),
        SuiteKind::Registration => Box::new(RegistrationSuite),
        SuiteKind::LocalSettings => Box::new(LocalSettingsSuite),
        SuiteKind::PrinterState => Box::new(PrinterStateSuite),
        SuiteKind::JobState => Box::new(JobStateSuite),
    }
}

/// Pass on an automatic observation, falling back to the operator on timeout
pub(crate) async fn observed_or_confirmed(
    ctx: &SuiteContext,
    observed: Result<String>,
    question: &str,
) -> Result<Verdict> {
    match observed {
        Ok(detail) => Ok(Verdict::pass(detail)),
        Err(CertError::Timeout(msg)) => {
            if ctx.prompter.confirm(question).await? {
                Ok(Verdict::pass(format!("Operator confirmed ({})", msg)))
            } else {
                Ok(Verdict::fail(msg))
            }
        }
        Err(e) => Err(e),
    }
}

pub(crate) fn unknown_case(kind: SuiteKind, case: &str) -> CertError {
    CertError::Other(format!("Unknown case '{}' in {}", case, kind.display_name()))
}
