//! Recording results to the results log and the results spreadsheet
//!
//! The markdown log is the record of truth. The spreadsheet is a convenience
//! copy; every spreadsheet operation is fail-open.

use chrono::Utc;
use logocert_core::config::DeviceConfig;
use logocert_core::fail_open::fail_open;
use logocert_core::{CertError, Result, RunSummary, TestOutcome, TestRecord};
use logocert_gdocs::{SheetsClient, Worksheet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Table cells cannot contain pipes or line breaks
fn table_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

/// Results spreadsheet, looked up or created on first use
pub struct SheetRecorder {
    client: SheetsClient,
    name: String,
    target: tokio::sync::Mutex<Option<(String, Worksheet)>>,
}

impl SheetRecorder {
    pub fn new(client: SheetsClient, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
            target: tokio::sync::Mutex::new(None),
        }
    }

    async fn ensure_target(&self) -> Result<(String, Worksheet)> {
        let mut target = self.target.lock().await;
        if let Some(existing) = target.as_ref() {
            return Ok(existing.clone());
        }

        let spreadsheet_id = match self.client.spreadsheet_id(&self.name).await? {
            Some(id) => id,
            None => {
                info!("Creating results spreadsheet '{}'", self.name);
                self.client.create_sheet(&self.name).await?
            }
        };
        let worksheet = self
            .client
            .worksheet_id(&spreadsheet_id)
            .await?
            .ok_or_else(|| CertError::Sheets(format!("Spreadsheet '{}' has no worksheet", self.name)))?;

        if self.client.column_headers(&spreadsheet_id, &worksheet).await?.is_empty() {
            self.client
                .create_column_headers(&TestRecord::column_headers(), &spreadsheet_id, &worksheet)
                .await?;
        }

        *target = Some((spreadsheet_id.clone(), worksheet.clone()));
        Ok((spreadsheet_id, worksheet))
    }

    pub async fn append(&self, record: &TestRecord) -> Result<()> {
        let (spreadsheet_id, worksheet) = self.ensure_target().await?;
        self.client
            .add_row_using_column_headers(&TestRecord::column_headers(), &record.as_row(), &spreadsheet_id, &worksheet)
            .await
    }
}

/// Appends every result to the results log and, optionally, the spreadsheet
pub struct ResultRecorder {
    results_path: PathBuf,
    sheet: Option<SheetRecorder>,
    records: Mutex<Vec<TestRecord>>,
}

impl ResultRecorder {
    pub fn new(results_path: impl Into<PathBuf>) -> Self {
        Self {
            results_path: results_path.into(),
            sheet: None,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn with_sheet(mut self, sheet: SheetRecorder) -> Self {
        self.sheet = Some(sheet);
        self
    }

    pub fn results_path(&self) -> &Path {
        &self.results_path
    }

    /// Results recorded so far
    pub fn records(&self) -> Vec<TestRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Start a fresh results log for `device`
    ///
    /// This operation is fail-open - logging failures won't stop the run
    pub async fn start_run(&self, device: &DeviceConfig) {
        fail_open("recorder::start_run", || async {
            if let Some(parent) = self.results_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            let content = format!(
                "# Logocert Results\n\n\
                **Printer**: {}\n\
                **Model**: {} {}\n\
                **Firmware**: {}\n\
                **Started**: {}\n\n\
                | Suite | Test | Result | Notes |\n\
                |---|---|---|---|\n",
                device.name,
                device.manufacturer,
                device.model,
                device.firmware,
                Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
            );

            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.results_path)
                .await?;
            file.write_all(content.as_bytes()).await?;
            file.flush().await?;
            Ok(())
        })
        .await;
    }

    /// Record one result
    pub async fn record(&self, record: TestRecord) {
        let line = format!(
            "| {} | {} | {} | {} |\n",
            record.suite.display_name(),
            table_cell(&record.test),
            record.outcome,
            table_cell(&record.notes)
        );
        fail_open("recorder::record", || self.append(&line)).await;

        if let Some(sheet) = &self.sheet {
            fail_open("recorder::sheet", || sheet.append(&record)).await;
        }

        match record.outcome {
            TestOutcome::Failed | TestOutcome::Blocked => warn!(
                "{} / {}: {} {}",
                record.suite.display_name(),
                record.test,
                record.outcome,
                record.notes
            ),
            _ => info!(
                "{} / {}: {} {}",
                record.suite.display_name(),
                record.test,
                record.outcome,
                record.notes
            ),
        }

        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }

    /// Append the run summary
    pub async fn finish_run(&self, summary: &RunSummary) {
        let content = format!(
            "\n## Summary\n\n**Completed**: {}\n**Result**: {}\n\n{}\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            if summary.all_passed() { "PASSED" } else { "FAILED" },
            summary
        );
        fail_open("recorder::finish_run", || self.append(&content)).await;
    }

    async fn append(&self, content: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.results_path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logocert_core::SuiteKind;
    use tempfile::TempDir;

    #[test]
    fn test_table_cell_escaping() {
        assert_eq!(table_cell("a|b\nc"), "a\\|b c");
    }

    #[tokio::test]
    async fn test_results_log() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("logs").join("results.md");
        let recorder = ResultRecorder::new(path.clone());

        let device = DeviceConfig {
            name: "Acme LaserJet".to_string(),
            ..Default::default()
        };
        recorder.start_run(&device).await;
        recorder
            .record(TestRecord::new(SuiteKind::Privet, "info_required_fields", TestOutcome::Passed, ""))
            .await;
        recorder
            .record(TestRecord::new(
                SuiteKind::JobState,
                "pages_printed",
                TestOutcome::Failed,
                "0 pages | expected 1",
            ))
            .await;

        let mut summary = RunSummary::default();
        summary.record(TestOutcome::Passed);
        summary.record(TestOutcome::Failed);
        recorder.finish_run(&summary).await;

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(content.contains("**Printer**: Acme LaserJet"));
        assert!(content.contains("| Privet Tests | info_required_fields | PASSED |  |"));
        assert!(content.contains("| Job State Tests | pages_printed | FAILED | 0 pages \\| expected 1 |"));
        assert!(content.contains("**Result**: FAILED"));
        assert_eq!(recorder.records().len(), 2);
    }

    #[tokio::test]
    async fn test_unwritable_log_does_not_panic() {
        let temp_dir = TempDir::new().unwrap();
        // A directory where the file should be
        let recorder = ResultRecorder::new(temp_dir.path().to_path_buf());
        recorder
            .record(TestRecord::new(SuiteKind::Discovery, "printer_advertised", TestOutcome::Passed, ""))
            .await;
        assert_eq!(recorder.records().len(), 1);
    }
}
