//! # logocert-core
//!
//! Shared building blocks for the logocert printer certification harness.
//!
//! The harness drives a browser and a handful of Google and local-network APIs
//! against a printer under test, then records pass/fail for every test case.
//! This crate holds what every other crate needs:
//!
//! - [`CertError`] and the crate-wide [`Result`] alias
//! - [`config::CertConfig`], loaded from `logocert.toml`
//! - Domain types: suites, outcomes, printer and job states
//! - [`fail_open`] helpers for side channels and flaky UI automation

pub mod config;
mod error;
pub mod fail_open;
mod types;

pub use config::CertConfig;
pub use error::{CertError, Result};
pub use types::*;
