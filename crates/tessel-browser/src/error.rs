//! Error types for headless rendering.
//!
//! [`BrowserError`] covers failures of the browser itself: launching
//! Chrome, talking CDP, navigating and waiting. Errors thrown by the page's
//! own server scripts are not browser errors; the runtime reports them as
//! [`RenderError::ServerScript`].

use std::time::Duration;
use tessel_core::RenderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    /// Failed to launch the browser process.
    ///
    /// Usually Chrome is not installed or not executable.
    #[error("failed to launch browser: {reason}\n\nHint: Install Chrome or Chromium, or set `chrome_path` in tessel.config.json")]
    LaunchFailed {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Failed to talk to the browser over the DevTools protocol.
    #[error("CDP connection failed: {0}")]
    ConnectionFailed(String),

    /// Navigation to a URL failed.
    #[error("navigation to '{url}' failed: {reason}")]
    NavigationFailed { url: String, reason: String },

    /// A wait condition was not satisfied within the timeout.
    #[error("wait condition '{condition}' timed out after {timeout:?}")]
    WaitTimeout { condition: String, timeout: Duration },

    /// Evaluating JavaScript in the page failed.
    #[error("JavaScript execution failed: {0}")]
    ScriptExecutionFailed(String),

    /// An operation was attempted on a closed browser.
    #[error("browser instance is already closed")]
    AlreadyClosed,

    #[error("chromiumoxide error: {0}")]
    ChromiumOxide(#[from] chromiumoxide::error::CdpError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BrowserError>;

impl From<BrowserError> for RenderError {
    fn from(error: BrowserError) -> Self {
        RenderError::Runtime(error.to_string())
    }
}
