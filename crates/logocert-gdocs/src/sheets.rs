//! Results spreadsheet over the Sheets v4 and Drive v3 REST APIs

use crate::auth::TokenManager;
use logocert_core::{CertError, Result};
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4";
pub const DRIVE_API_URL: &str = "https://www.googleapis.com/drive/v3";

const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

// Rate limit retry configuration
const MAX_RETRIES: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// First worksheet of a spreadsheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worksheet {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedSpreadsheet {
    spreadsheet_id: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Spreadsheet column letters for a 1-based column number (1 -> A, 27 -> AA)
pub fn column_letter(mut column: usize) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        column = (column - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// A1 range covering `columns` header cells in row 1
pub fn header_range(columns: usize) -> String {
    format!("A1:{}1", column_letter(columns.max(1)))
}

fn sheet_range(worksheet: &Worksheet, range: &str) -> String {
    format!("'{}'!{}", worksheet.title.replace('\'', "''"), range)
}

/// Drive query literal escaping
fn quote_query(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Place `row` values under the sheet's existing headers
///
/// `headers[i]` names the column `row[i]` belongs to. Columns without a value
/// stay empty.
pub fn align_row(sheet_headers: &[String], headers: &[String], row: &[String]) -> Result<Vec<String>> {
    if headers.len() != row.len() {
        return Err(CertError::Sheets(format!(
            "Row has {} values for {} headers",
            row.len(),
            headers.len()
        )));
    }

    let mut aligned = vec![String::new(); sheet_headers.len()];
    for (header, value) in headers.iter().zip(row) {
        let column = sheet_headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(header.trim()))
            .ok_or_else(|| CertError::Sheets(format!("Column header '{}' not found in sheet", header)))?;
        aligned[column] = value.clone();
    }
    Ok(aligned)
}

/// Client for the results spreadsheet
pub struct SheetsClient {
    http: reqwest::Client,
    tokens: Arc<TokenManager>,
    sheets_url: String,
    drive_url: String,
    initial_backoff: Duration,
}

impl SheetsClient {
    pub fn new(tokens: Arc<TokenManager>) -> Self {
        Self::with_base_urls(tokens, SHEETS_API_URL, DRIVE_API_URL)
    }

    /// Client against non-default API roots
    pub fn with_base_urls(tokens: Arc<TokenManager>, sheets_url: &str, drive_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            tokens,
            sheets_url: sheets_url.trim_end_matches('/').to_string(),
            drive_url: drive_url.trim_end_matches('/').to_string(),
            initial_backoff: INITIAL_BACKOFF,
        }
    }

    /// Override the first retry delay (doubles on each retry)
    pub fn with_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    fn url(&self, base: &str, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(base).map_err(|e| CertError::Config(format!("Invalid API URL '{}': {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| CertError::Config(format!("API URL '{}' cannot take a path", base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send an authorized request, retrying rate limits and server errors
    async fn send(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Value> {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;
        let mut reauthorized = false;

        loop {
            let token = self.tokens.access_token().await?;
            debug!("{} {} (attempt {})", method, url, retries + 1);

            let mut request = self.http.request(method.clone(), url.clone()).bearer_auth(&token);
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request
                .send()
                .await
                .map_err(|e| CertError::Api(format!("Failed to send request: {}", e)))?;

            let status = response.status();

            if status == StatusCode::UNAUTHORIZED && !reauthorized {
                warn!("Access token rejected, refreshing");
                self.tokens.invalidate().await;
                reauthorized = true;
                continue;
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RETRIES {
                    let error_text = response.text().await.unwrap_or_else(|_| "Unknown".to_string());
                    return Err(CertError::ApiLimit(format!(
                        "Rate limit exceeded after {} retries. Last error: {}",
                        MAX_RETRIES, error_text
                    )));
                }

                let wait = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(backoff);

                warn!(
                    "Rate limited (429). Waiting {:?} before retry {}/{}",
                    wait, retries, MAX_RETRIES
                );
                tokio::time::sleep(wait).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
                continue;
            }

            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_else(|_| "Unknown".to_string());

                if status.is_server_error() && retries < MAX_RETRIES {
                    retries += 1;
                    warn!(
                        "Server error ({}). Waiting {:?} before retry {}/{}",
                        status, backoff, retries, MAX_RETRIES
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }

                return Err(CertError::Sheets(format!("{} {} returned {}: {}", method, url.path(), status, error_text)));
            }

            let text = response
                .text()
                .await
                .map_err(|e| CertError::Api(format!("Failed to read response: {}", e)))?;
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return Ok(serde_json::from_str(&text)?);
        }
    }

    /// Create a spreadsheet titled `name`, returning its id
    pub async fn create_sheet(&self, name: &str) -> Result<String> {
        let url = self.url(&self.sheets_url, &["spreadsheets"])?;
        let body = json!({ "properties": { "title": name } });
        let created: CreatedSpreadsheet = serde_json::from_value(self.send(Method::POST, url, Some(&body)).await?)?;
        info!("Created spreadsheet '{}' ({})", name, created.spreadsheet_id);
        Ok(created.spreadsheet_id)
    }

    /// Id of the spreadsheet titled exactly `name`
    pub async fn spreadsheet_id(&self, name: &str) -> Result<Option<String>> {
        let mut url = self.url(&self.drive_url, &["files"])?;
        url.query_pairs_mut()
            .append_pair(
                "q",
                &format!(
                    "name = {} and mimeType = '{}' and trashed = false",
                    quote_query(name),
                    SPREADSHEET_MIME
                ),
            )
            .append_pair("fields", "files(id,name)");

        let list: FileList = serde_json::from_value(self.send(Method::GET, url, None).await?)?;
        Ok(list.files.into_iter().find(|f| f.name == name).map(|f| f.id))
    }

    /// First worksheet of the spreadsheet
    pub async fn worksheet_id(&self, spreadsheet_id: &str) -> Result<Option<Worksheet>> {
        let mut url = self.url(&self.sheets_url, &["spreadsheets", spreadsheet_id])?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties");

        let meta: SpreadsheetMeta = serde_json::from_value(self.send(Method::GET, url, None).await?)?;
        Ok(meta.sheets.into_iter().next().map(|s| Worksheet {
            id: s.properties.sheet_id,
            title: s.properties.title,
        }))
    }

    /// Write `headers` into row 1
    pub async fn create_column_headers(
        &self,
        headers: &[String],
        spreadsheet_id: &str,
        worksheet: &Worksheet,
    ) -> Result<()> {
        let range = sheet_range(worksheet, &header_range(headers.len()));
        let mut url = self.url(&self.sheets_url, &["spreadsheets", spreadsheet_id, "values", &range])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        let body = json!({ "range": range, "majorDimension": "ROWS", "values": [headers] });
        self.send(Method::PUT, url, Some(&body)).await?;
        info!("Wrote {} column headers to {}", headers.len(), range);
        Ok(())
    }

    /// Current header row of the worksheet
    pub async fn column_headers(&self, spreadsheet_id: &str, worksheet: &Worksheet) -> Result<Vec<String>> {
        let range = sheet_range(worksheet, "1:1");
        let url = self.url(&self.sheets_url, &["spreadsheets", spreadsheet_id, "values", &range])?;
        let values: ValueRange = serde_json::from_value(self.send(Method::GET, url, None).await?)?;
        Ok(values.values.into_iter().next().unwrap_or_default())
    }

    /// Append a row whose values are placed under the matching headers
    pub async fn add_row_using_column_headers(
        &self,
        headers: &[String],
        row: &[String],
        spreadsheet_id: &str,
        worksheet: &Worksheet,
    ) -> Result<()> {
        let sheet_headers = self.column_headers(spreadsheet_id, worksheet).await?;
        if sheet_headers.is_empty() {
            return Err(CertError::Sheets(format!(
                "Worksheet '{}' has no column headers",
                worksheet.title
            )));
        }
        let aligned = align_row(&sheet_headers, headers, row)?;

        let range = sheet_range(worksheet, &header_range(sheet_headers.len()));
        let append = format!("{}:append", range);
        let mut url = self.url(&self.sheets_url, &["spreadsheets", spreadsheet_id, "values", &append])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let body = json!({ "majorDimension": "ROWS", "values": [aligned] });
        self.send(Method::POST, url, Some(&body)).await?;
        debug!("Appended row to '{}'", worksheet.title);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(4), "D");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(53), "BA");
    }

    #[test]
    fn test_header_range() {
        assert_eq!(header_range(4), "A1:D1");
        assert_eq!(header_range(0), "A1:A1");
    }

    #[test]
    fn test_sheet_range_quotes_title() {
        let ws = Worksheet {
            id: 0,
            title: "Bob's Sheet".to_string(),
        };
        assert_eq!(sheet_range(&ws, "A1:D1"), "'Bob''s Sheet'!A1:D1");
    }

    #[test]
    fn test_quote_query() {
        assert_eq!(quote_query("Logocert Results"), "'Logocert Results'");
        assert_eq!(quote_query("it's"), "'it\\'s'");
    }

    #[test]
    fn test_align_row_follows_sheet_order() {
        let sheet = strings(&["Suite", "Test", "Result", "Notes"]);
        let aligned = align_row(
            &sheet,
            &strings(&["Result", "Suite", "Test"]),
            &strings(&["PASSED", "Privet Tests", "info"]),
        )
        .unwrap();
        assert_eq!(aligned, strings(&["Privet Tests", "info", "PASSED", ""]));
    }

    #[test]
    fn test_align_row_rejects_mismatch() {
        let sheet = strings(&["Suite", "Test"]);
        assert!(align_row(&sheet, &strings(&["Suite"]), &strings(&["a", "b"])).is_err());
        assert!(align_row(&sheet, &strings(&["Owner"]), &strings(&["a"])).is_err());
    }
}
