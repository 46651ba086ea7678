//! Chrome process lifecycle.
//!
//! [`HeadlessBrowser`] owns one Chrome process driven over the DevTools
//! protocol. Tabs are cheap; the runtime opens one per render and keeps
//! the process for the lifetime of the server.

use crate::error::{BrowserError, Result};
use crate::page::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// How to launch Chrome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Run without a window (default: true unless built with `visible`)
    pub headless: bool,

    pub window_size: (u32, u32),

    /// Extra Chrome command line arguments
    pub args: Vec<String>,

    /// Chrome executable; `None` auto-detects
    pub chrome_path: Option<PathBuf>,
}

impl LaunchConfig {
    pub fn with_chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    fn to_browser_config(&self) -> Result<BrowserConfig> {
        let mut config = BrowserConfig::builder();

        if !self.headless {
            config = config.with_head();
        }

        config = config.window_size(self.window_size.0, self.window_size.1);

        // A fresh profile per process so concurrent servers and tests do
        // not fight over Chrome's profile lock.
        let profile = std::env::temp_dir().join(format!("tessel-chrome-{}", uuid::Uuid::new_v4()));
        config = config.user_data_dir(profile);

        for arg in &self.args {
            config = config.arg(arg.clone());
        }

        if let Some(path) = &self.chrome_path {
            config = config.chrome_executable(path);
        }

        config.build().map_err(|e| BrowserError::LaunchFailed {
            reason: format!("invalid browser configuration: {e}"),
            source: None,
        })
    }
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            headless: !cfg!(feature = "visible"),
            window_size: (1280, 800),
            args: vec![
                // Containers rarely provide the user namespaces the sandbox needs.
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
            ],
            chrome_path: None,
        }
    }
}

/// A running Chrome process.
pub struct HeadlessBrowser {
    inner: Arc<Mutex<Option<Browser>>>,
}

impl HeadlessBrowser {
    /// Launch Chrome and start driving its CDP connection.
    ///
    /// # Errors
    ///
    /// Returns `LaunchFailed` if Chrome is missing or fails to start.
    pub async fn launch(config: LaunchConfig) -> Result<Self> {
        debug!("Launching browser with config: {:?}", config);

        let (browser, mut handler) = Browser::launch(config.to_browser_config()?)
            .await
            .map_err(|e| BrowserError::LaunchFailed {
                reason: "failed to launch Chrome process".to_string(),
                source: Some(Box::new(e)),
            })?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("Browser handler error: {}", e);
                }
            }
        });

        debug!("Browser launched");
        Ok(Self {
            inner: Arc::new(Mutex::new(Some(browser))),
        })
    }

    /// Open a blank tab.
    pub async fn new_page(&self) -> Result<Page> {
        let browser = self.inner.lock().await;
        let browser = browser.as_ref().ok_or(BrowserError::AlreadyClosed)?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::ConnectionFailed(e.to_string()))?;

        Page::new(page).await
    }

    /// Close Chrome. Later calls and `new_page` see `AlreadyClosed`.
    pub async fn close(&self) -> Result<()> {
        if let Some(mut browser) = self.inner.lock().await.take() {
            debug!("Closing browser");
            browser
                .close()
                .await
                .map_err(|e| BrowserError::ConnectionFailed(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_headless_with_container_flags() {
        let config = LaunchConfig::default();
        assert_eq!(config.headless, !cfg!(feature = "visible"));
        assert!(config.args.iter().any(|a| a == "--no-sandbox"));
        assert!(config.chrome_path.is_none());
    }

    #[test]
    fn chrome_path_is_configurable() {
        let config = LaunchConfig::default().with_chrome_path("/usr/bin/chromium");
        assert_eq!(config.chrome_path, Some(PathBuf::from("/usr/bin/chromium")));
    }

    #[tokio::test]
    #[ignore] // Requires Chrome to be installed
    async fn launch_and_close() {
        let browser = HeadlessBrowser::launch(LaunchConfig::default())
            .await
            .expect("failed to launch browser");
        browser.close().await.expect("failed to close browser");
        assert!(matches!(browser.new_page().await, Err(BrowserError::AlreadyClosed)));
    }
}
