//! Error types for the smoke suite

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SmokeError {
    #[error("Browser driver not found at {}. Install chromedriver or set CHROMEDRIVER_PATH", .0.display())]
    DriverNotFound(PathBuf),

    #[error("Browser driver failed to start: {0}")]
    DriverStartup(String),

    #[error("WebDriver error: {0}")]
    WebDriver(#[from] thirtyfour::error::WebDriverError),

    #[error("Timeout after {seconds:.1}s waiting for {what}; page content: {snippet}")]
    Timeout {
        what: String,
        seconds: f64,
        snippet: String,
    },

    #[error("Assertion failed: expected {expected}, got {actual}")]
    AssertionFailed { expected: String, actual: String },

    #[error("Database error reported by page: {0}")]
    DatabaseError(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SmokeError {
    pub fn assertion(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        SmokeError::AssertionFailed {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Whether the error happened before any scenario could run.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            SmokeError::DriverNotFound(_) | SmokeError::DriverStartup(_) | SmokeError::Config(_)
        )
    }
}

pub type SmokeResult<T> = Result<T, SmokeError>;
