//! Cloud Print automation for the certification harness
//!
//! [`manager::CloudPrintManager`] drives the Cloud Print management and
//! simulate pages through a [`logocert_browser::BrowserSession`]. Suites talk
//! to it through the [`portal::CloudPrintPortal`] trait and wait on printer and
//! job state with the helpers in [`poll`].

pub mod manager;
pub mod poll;
pub mod portal;

pub use manager::{parse_pages_printed, AdvancedSetting, CloudPrintManager, UpdateOption};
pub use poll::{
    mentions_any, poll_until, wait_for_job_status, wait_for_printer_state, wait_for_state_cleared,
    wait_for_state_message, PollSettings,
};
pub use portal::{CloudPrintPortal, UnavailablePortal};
