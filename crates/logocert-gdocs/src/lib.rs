//! Google document services for the certification harness
//!
//! - [`auth`]: OAuth2 consent URL, code exchange and refreshing access tokens
//! - [`sheets`]: the results spreadsheet (create, look up, headers, rows)

pub mod auth;
pub mod sheets;

pub use auth::{exchange_code, refresh, OAuthCredentials, TokenManager, TokenResponse};
pub use sheets::{align_row, header_range, SheetsClient, Worksheet};
