//! Browser error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("no Chromium-based browser found\n\n{hint}")]
    NotFound { hint: String },

    #[error("browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    #[error("no element matches selector '{0}'")]
    ElementNotFound(String),

    #[error("JavaScript evaluation failed: {0}")]
    JsEvalFailed(String),

    #[error("screenshot failed: {0}")]
    ScreenshotFailed(String),

    #[error("browser session is closed")]
    Closed,

    #[error("CDP error: {0}")]
    Cdp(String),
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Self::Cdp(err.to_string())
    }
}

impl From<BrowserError> for wayfinder_common::Error {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::NotFound { .. } | BrowserError::LaunchFailed(_) => {
                Self::unavailable("browser", err.to_string())
            },
            other => Self::message(other.to_string()),
        }
    }
}
