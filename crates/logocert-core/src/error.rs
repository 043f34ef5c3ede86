//! Unified error type for logocert

use thiserror::Error;

/// Unified error type for all certification operations
#[derive(Error, Debug)]
pub enum CertError {
    // Browser errors
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("Navigation failed: {0}")]
    Navigation(String),

    // Google API errors
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("API rate limit: {0}")]
    ApiLimit(String),

    #[error("Spreadsheet error: {0}")]
    Sheets(String),

    // Local network errors
    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Privet {endpoint} returned error '{code}': {description}")]
    Privet {
        endpoint: String,
        code: String,
        description: String,
    },

    // Harness errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl CertError {
    /// Shorthand for a missing element described by its selector
    pub fn not_found(selector: impl Into<String>) -> Self {
        Self::ElementNotFound {
            selector: selector.into(),
        }
    }

    /// The Privet error code, if this is a Privet protocol error
    pub fn privet_code(&self) -> Option<&str> {
        match self {
            Self::Privet { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Result type alias using CertError
pub type Result<T> = std::result::Result<T, CertError>;
