//! Browser automation for the certification harness
//!
//! Drives Chrome through the DevTools Protocol. The Cloud Print management
//! pages are plain web UIs, so every test step that touches them comes down to
//! a handful of primitives: navigate, find elements, read text or attributes,
//! click, type.
//!
//! # Example
//!
//! ```no_run
//! use logocert_browser::{BrowserSession, Locator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = BrowserSession::launch().await?;
//!     session.navigate("https://www.google.com/cloudprint").await?;
//!
//!     for printer in session.find_all(&Locator::class("cp-dashboard-printer-name")).await? {
//!         println!("{}", printer.text);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`browser`]: session lifecycle, element lookup and actions, frames and windows
//! - [`locator`]: locators and element paths resolved in page JavaScript
//! - [`screenshot`]: PNG capture for failed test cases
//! - [`verification`]: aria toggles, page-load checks and text waits

pub mod browser;
pub mod locator;
pub mod screenshot;
pub mod verification;

pub use browser::{BrowserConfig, BrowserSession};
pub use locator::{ElementPath, Locator, PageElement};
pub use logocert_core::{CertError, Result};
pub use screenshot::capture_screenshot;
pub use verification::{aria_state, is_aria_true, verify_page_loaded, wait_for_text};
