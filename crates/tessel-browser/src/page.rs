//! A browser tab used for one render.

use crate::console::{ConsoleCapture, parse_console_event};
use crate::error::{BrowserError, Result};
use crate::wait::{WaitConfig, wait_for_result};
use chromiumoxide::cdp::browser_protocol::emulation::SetScriptExecutionDisabledParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::page::Page as ChromePage;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

/// Browser tab with console capture.
///
/// The console listener is subscribed before the tab is handed out, so
/// messages logged during the first navigation are not lost.
#[derive(Debug)]
pub struct Page {
    inner: ChromePage,
    console: ConsoleCapture,
    console_task: JoinHandle<()>,
}

impl Page {
    pub(crate) async fn new(page: ChromePage) -> Result<Self> {
        let console = ConsoleCapture::new();
        let mut events = page.event_listener::<EventConsoleApiCalled>().await?;

        let capture = console.clone();
        let console_task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                capture.push(parse_console_event(&event));
            }
        });

        Ok(Self {
            inner: page,
            console,
            console_task,
        })
    }

    pub fn console(&self) -> &ConsoleCapture {
        &self.console
    }

    /// Run `source` at the start of every document this tab loads, before
    /// any of the page's own scripts.
    pub async fn add_init_script(&self, source: &str) -> Result<()> {
        self.inner
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(source))
            .await?;
        Ok(())
    }

    /// Navigate to an absolute URL and wait for the load event.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.inner
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigationFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    /// Evaluate a JavaScript expression and deserialize its value.
    pub async fn evaluate<T>(&self, expression: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let result = self
            .inner
            .evaluate(expression)
            .await
            .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))?;

        result
            .into_value()
            .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))
    }

    /// Wait until the boolean `expression` evaluates to `true`.
    pub async fn wait_until(&self, expression: &str, config: WaitConfig) -> Result<()> {
        wait_for_result(
            || async move { self.evaluate::<bool>(expression).await },
            config,
            expression,
        )
        .await
    }

    /// Stop every script of the current document, including timers, so
    /// the DOM no longer changes.
    pub async fn disable_scripts(&self) -> Result<()> {
        self.inner
            .execute(SetScriptExecutionDisabledParams::new(true))
            .await?;
        Ok(())
    }

    /// Serialized document, doctype included.
    pub async fn content(&self) -> Result<String> {
        Ok(self.inner.content().await?)
    }

    pub async fn close(self) -> Result<()> {
        self.console_task.abort();
        self.inner.close().await?;
        Ok(())
    }
}
