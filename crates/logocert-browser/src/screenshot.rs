//! Screenshot capture using Chrome DevTools Protocol

use crate::browser::BrowserSession;
use chrono::{DateTime, Utc};
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use logocert_core::{CertError, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// File name for a screenshot: `{timestamp}-{sanitized name}.png`
pub fn screenshot_file_name(name: &str, at: DateTime<Utc>) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let trimmed = sanitized.trim_matches('_');
    let stem = if trimmed.is_empty() { "page" } else { trimmed };
    format!("{}-{}.png", at.format("%Y%m%d-%H%M%S"), stem)
}

/// Capture the current page as PNG into `dir`, returning the written path
pub async fn capture_screenshot(session: &BrowserSession, dir: &Path, name: &str) -> Result<PathBuf> {
    let data = session
        .tab()
        .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
        .map_err(|e| CertError::Browser(format!("CDP capture failed: {}", e)))?;

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(screenshot_file_name(name, Utc::now()));
    tokio::fs::write(&path, &data).await?;

    info!("Screenshot stored: {} ({} bytes)", path.display(), data.len());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_file_name_is_sanitized() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            screenshot_file_name("Printer State Tests/out of paper", at),
            "20240309-140507-Printer_State_Tests_out_of_paper.png"
        );
    }

    #[test]
    fn test_empty_name_falls_back() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(screenshot_file_name("//", at), "20240101-000000-page.png");
    }
}
