//! DOM checks used by the page helpers

use crate::browser::BrowserSession;
use crate::locator::{Locator, PageElement};
use logocert_core::{CertError, Result};
use std::time::{Duration, Instant};
use tracing::debug;

/// Interpret an `aria-expanded` / `aria-checked` value
///
/// Anything other than an explicit `"false"` counts as set, matching how the
/// management page renders toggles without the attribute.
pub fn is_aria_true(value: Option<&str>) -> bool {
    !matches!(value.map(|v| v.trim()), Some("false"))
}

/// Whether the element's aria toggle attribute is currently set
pub async fn aria_state(session: &BrowserSession, element: &PageElement, attribute: &str) -> Result<bool> {
    let value = session.attribute(element, attribute).await?;
    Ok(is_aria_true(value.as_deref()))
}

/// Page finished loading and is not an error page
pub async fn verify_page_loaded(session: &BrowserSession) -> Result<bool> {
    let ready_state = session
        .evaluate_script("document.readyState")
        .await?
        .as_str()
        .unwrap_or("")
        .to_string();
    let title = session.title().await?;

    let loaded = is_loaded(&ready_state, &title);
    if !loaded {
        debug!("Page not loaded: readyState '{}', title '{}'", ready_state, title);
    }
    Ok(loaded)
}

fn is_loaded(ready_state: &str, title: &str) -> bool {
    matches!(ready_state, "complete" | "interactive") && !looks_like_error_page(title)
}

fn looks_like_error_page(title: &str) -> bool {
    ["404", "Not Found", "403", "500", "Server Error"]
        .iter()
        .any(|marker| title.contains(marker))
}

/// Wait until some match of `locator` contains `needle` in its text
pub async fn wait_for_text(
    session: &BrowserSession,
    locator: &Locator,
    needle: &str,
    timeout: Duration,
) -> Result<PageElement> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(found) = session.find_all(locator).await {
            if let Some(element) = found.into_iter().find(|e| e.text.contains(needle)) {
                return Ok(element);
            }
        }
        if Instant::now() >= deadline {
            return Err(CertError::Timeout(format!(
                "waiting for '{}' in {}",
                needle, locator
            )));
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aria_values() {
        assert!(!is_aria_true(Some("false")));
        assert!(!is_aria_true(Some(" false ")));
        assert!(is_aria_true(Some("true")));
        assert!(is_aria_true(Some("mixed")));
        assert!(is_aria_true(None));
    }

    #[test]
    fn test_loaded_requires_ready_page_without_error_title() {
        assert!(is_loaded("complete", "Google Cloud Print"));
        assert!(is_loaded("interactive", "Google Cloud Print"));
        assert!(!is_loaded("loading", "Google Cloud Print"));
        assert!(!is_loaded("complete", "Error 404 (Not Found)!!1"));
    }

    #[test]
    fn test_error_page_titles() {
        assert!(looks_like_error_page("404 Not Found"));
        assert!(looks_like_error_page("500 Internal Server Error"));
        assert!(!looks_like_error_page("Google Cloud Print"));
    }
}
