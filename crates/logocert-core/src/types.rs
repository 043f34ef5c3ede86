//! Core type definitions for certification runs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Certification suites, in the order they are normally run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuiteKind {
    Discovery,
    Privet,
    Registration,
    LocalSettings,
    PrinterState,
    JobState,
}

impl SuiteKind {
    /// All suites in canonical run order
    pub fn all() -> Vec<SuiteKind> {
        vec![
            Self::Discovery,
            Self::Privet,
            Self::Registration,
            Self::LocalSettings,
            Self::PrinterState,
            Self::JobState,
        ]
    }

    /// Human-readable suite name used in logs and the results sheet
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Discovery => "Discovery Tests",
            Self::Privet => "Privet Tests",
            Self::Registration => "Registration Tests",
            Self::LocalSettings => "Local Settings Tests",
            Self::PrinterState => "Printer State Tests",
            Self::JobState => "Job State Tests",
        }
    }

    /// Whether the suite works through the Cloud Print web UI
    pub fn uses_portal(&self) -> bool {
        matches!(
            self,
            Self::Registration | Self::LocalSettings | Self::PrinterState | Self::JobState
        )
    }
}

impl std::fmt::Display for SuiteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovery => write!(f, "discovery"),
            Self::Privet => write!(f, "privet"),
            Self::Registration => write!(f, "registration"),
            Self::LocalSettings => write!(f, "local_settings"),
            Self::PrinterState => write!(f, "printer_state"),
            Self::JobState => write!(f, "job_state"),
        }
    }
}

impl std::str::FromStr for SuiteKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "discovery" => Ok(Self::Discovery),
            "privet" => Ok(Self::Privet),
            "registration" => Ok(Self::Registration),
            "local_settings" | "localsettings" => Ok(Self::LocalSettings),
            "printer_state" | "printerstate" => Ok(Self::PrinterState),
            "job_state" | "jobstate" => Ok(Self::JobState),
            _ => Err(format!("Invalid suite: {}", s)),
        }
    }
}

/// Result of a single test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    Failed,
    Skipped,
    /// Could not run because an earlier case in the suite failed a precondition
    Blocked,
}

impl std::fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "PASSED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Skipped => write!(f, "SKIPPED"),
            Self::Blocked => write!(f, "BLOCKED"),
        }
    }
}

/// One recorded test result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRecord {
    pub suite: SuiteKind,
    pub test: String,
    pub outcome: TestOutcome,
    pub notes: String,
    pub timestamp: DateTime<Utc>,
}

impl TestRecord {
    pub fn new(
        suite: SuiteKind,
        test: impl Into<String>,
        outcome: TestOutcome,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            suite,
            test: test.into(),
            outcome,
            notes: notes.into(),
            timestamp: Utc::now(),
        }
    }

    /// Column headers of the results spreadsheet, matching [`TestRecord::as_row`]
    pub fn column_headers() -> Vec<String> {
        ["Suite", "Test", "Result", "Notes"]
            .iter()
            .map(|h| h.to_string())
            .collect()
    }

    /// Spreadsheet row for this record
    pub fn as_row(&self) -> Vec<String> {
        vec![
            self.suite.display_name().to_string(),
            self.test.clone(),
            self.outcome.to_string(),
            self.notes.clone(),
        ]
    }
}

/// Basic printer state as shown on the management page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinterState {
    Idle,
    Processing,
    Stopped,
    Offline,
    Unknown(String),
}

impl PrinterState {
    /// Parse the state message text from the printer details page
    pub fn parse(text: &str) -> Self {
        let lower = text.trim().to_lowercase();
        if lower.contains("offline") || lower.contains("dormant") {
            Self::Offline
        } else if lower.contains("stopped") || lower.contains("error") {
            Self::Stopped
        } else if lower.contains("processing") || lower.contains("printing") {
            Self::Processing
        } else if lower.contains("idle") || lower.contains("ready") || lower.contains("online") {
            Self::Idle
        } else {
            Self::Unknown(text.trim().to_string())
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, Self::Idle | Self::Processing)
    }
}

impl std::fmt::Display for PrinterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Processing => write!(f, "processing"),
            Self::Stopped => write!(f, "stopped"),
            Self::Offline => write!(f, "offline"),
            Self::Unknown(s) => write!(f, "unknown ({})", s),
        }
    }
}

/// Print job status as shown in the management page job list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    InProgress,
    Printed,
    Error,
    Aborted,
    Held,
    Unknown(String),
}

impl JobStatus {
    /// Parse the status message of a job list item
    pub fn parse(text: &str) -> Self {
        let lower = text.trim().to_lowercase();
        match lower.as_str() {
            "queued" | "waiting" => Self::Queued,
            "in progress" | "in_progress" | "printing" => Self::InProgress,
            "printed" | "done" => Self::Printed,
            "error" => Self::Error,
            "aborted" | "canceled" | "cancelled" => Self::Aborted,
            "held" => Self::Held,
            _ if lower.starts_with("error") => Self::Error,
            _ if lower.starts_with("in progress") => Self::InProgress,
            _ => Self::Unknown(text.trim().to_string()),
        }
    }

    /// No further transitions are expected once a job reaches a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Printed | Self::Error | Self::Aborted)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "Queued"),
            Self::InProgress => write!(f, "In progress"),
            Self::Printed => write!(f, "Printed"),
            Self::Error => write!(f, "Error"),
            Self::Aborted => write!(f, "Aborted"),
            Self::Held => write!(f, "Held"),
            Self::Unknown(s) => write!(f, "{}", s),
        }
    }
}

/// Aggregate counts for a certification run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub blocked: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: TestOutcome) {
        match outcome {
            TestOutcome::Passed => self.passed += 1,
            TestOutcome::Failed => self.failed += 1,
            TestOutcome::Skipped => self.skipped += 1,
            TestOutcome::Blocked => self.blocked += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.blocked
    }

    /// True when nothing failed or was blocked
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.blocked == 0
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} tests: {} passed, {} failed, {} skipped, {} blocked",
            self.total(),
            self.passed,
            self.failed,
            self.skipped,
            self.blocked
        )
    }
}
