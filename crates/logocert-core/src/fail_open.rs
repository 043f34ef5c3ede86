//! Fail-open and retry helpers
//!
//! Two kinds of operations in a certification run are allowed to misbehave:
//!
//! - Side channels (results spreadsheet, screenshots) must never abort a run.
//!   Wrap them in [`fail_open`].
//! - UI automation against live web pages is flaky: an element may not be
//!   rendered yet on the first attempt. Wrap single page interactions in
//!   [`retry`].
//!
//! Test verdicts themselves must not be fail-open.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::Result;

/// Execute a side-channel operation, logging and swallowing any error
///
/// ```no_run
/// use logocert_core::fail_open::fail_open;
/// use logocert_core::Result;
///
/// async fn upload_row() -> Result<()> {
///     Ok(())
/// }
///
/// async fn example() {
///     let uploaded = fail_open("results_sheet", || upload_row()).await;
///     // uploaded is None if the upload failed
/// }
/// ```
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}

/// Run `f` up to `attempts` times, sleeping `delay` between attempts
///
/// Returns the first success or the last error. An `attempts` of zero is
/// treated as one.
pub async fn retry<F, Fut, T>(
    operation_name: &str,
    attempts: usize,
    delay: Duration,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(val) => return Ok(val),
            Err(e) if attempt >= attempts => {
                warn!(
                    "{} failed after {} attempts: {}",
                    operation_name, attempts, e
                );
                return Err(e);
            }
            Err(e) => {
                warn!(
                    "{} failed (attempt {}/{}): {}",
                    operation_name, attempt, attempts, e
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CertError;

    #[tokio::test]
    async fn test_fail_open_success() {
        let result = fail_open("test_op", || async { Ok::<_, CertError>(42) }).await;
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn test_fail_open_failure() {
        let result = fail_open("test_op", || async {
            Err::<i32, _>(CertError::Sheets("quota".to_string()))
        })
        .await;
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let mut calls = 0;
        let result = retry("select_printer", 3, Duration::from_millis(1), || {
            calls += 1;
            let current = calls;
            async move {
                if current < 3 {
                    Err(CertError::not_found(".cp-dashboard-printer-name"))
                } else {
                    Ok(current)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_retry_returns_last_error() {
        let mut calls = 0;
        let result: Result<()> = retry("open_details", 2, Duration::from_millis(1), || {
            calls += 1;
            let current = calls;
            async move { Err(CertError::Other(format!("attempt {}", current))) }
        })
        .await;
        assert_eq!(result.unwrap_err().to_string(), "attempt 2");
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_retry_zero_attempts_runs_once() {
        let mut calls = 0;
        let result = retry("once", 0, Duration::from_millis(1), || {
            calls += 1;
            async { Ok::<_, CertError>(()) }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls, 1);
    }
}
