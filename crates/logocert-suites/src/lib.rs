//! Certification suites and the runner that drives them
//!
//! A run walks the configured suites in order. Each case returns a
//! [`Verdict`]; the [`CertRunner`] records it through the [`ResultRecorder`],
//! marks the rest of a suite blocked when a case cannot be built upon, and
//! returns the [`logocert_core::RunSummary`].
//!
//! Suites reach the outside world only through [`SuiteContext`]: the Cloud
//! Print portal, the Privet device, mDNS discovery and the operator
//! [`Prompter`].

pub mod context;
pub mod prompt;
pub mod recorder;
pub mod runner;
pub mod suite;
pub mod suites;

pub use context::{RegistrationState, SuiteContext};
pub use prompt::{Prompter, ScriptedPrompter, StdinPrompter};
pub use recorder::{ResultRecorder, SheetRecorder};
pub use runner::CertRunner;
pub use suite::{Suite, TestCase, Verdict};
pub use suites::{default_suites, suite_for};
