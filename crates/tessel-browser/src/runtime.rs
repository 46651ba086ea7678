//! [`ScriptRuntime`] backed by headless Chrome.
//!
//! A prepared page (scripts turned into inert placeholders) is written
//! next to the real page inside the build output and served from a
//! loopback origin. An init script installed before navigation waits for
//! `DOMContentLoaded`, then turns each server-targeted placeholder back
//! into a live `<script>` and runs them one at a time in document order,
//! waiting for external scripts to load. Uncaught errors, failed loads
//! and rejected promises are collected; any of them fails the render.
//! When every script has finished, scripting is disabled and the DOM is
//! serialized.

use crate::browser::{HeadlessBrowser, LaunchConfig};
use crate::error::BrowserError;
use crate::server::StaticServer;
use crate::wait::WaitConfig;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tessel_core::error::RenderError;
use tessel_core::execute::scripts::{INLINE_ATTR, PLACEHOLDER_ATTR, PLACEHOLDER_TAG};
use tessel_core::site;
use tessel_core::{ExecutionRequest, ScriptRuntime};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Default time a page may take to load and run its server scripts.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

const DONE_EXPRESSION: &str = "!!(window.__tessel && window.__tessel.done)";
const ERRORS_EXPRESSION: &str = "(window.__tessel && window.__tessel.errors) || []";

const RUNNER: &str = r#"(() => {
  const state = (window.__tessel = { done: false, errors: [] });
  const describe = (value) => String((value && value.stack) || value);
  window.addEventListener('error', (event) => {
    state.errors.push(event.error ? describe(event.error) : String(event.message));
  });
  window.addEventListener('unhandledrejection', (event) => {
    state.errors.push(describe(event.reason));
  });

  const run = async () => {
    const placeholders = Array.from(document.querySelectorAll('__TAG__[__MARKER__]'))
      .filter((el) => (el.getAttribute('side') || '').includes('server'));
    for (const placeholder of placeholders) {
      const script = document.createElement('script');
      for (const attr of Array.from(placeholder.attributes)) {
        if (!['__MARKER__', '__INLINE__', 'src'].includes(attr.name)) {
          script.setAttribute(attr.name, attr.value);
        }
      }
      let src = placeholder.getAttribute('src');
      const code = placeholder.getAttribute('__INLINE__') || '';
      if (!src && script.type === 'module') {
        src = URL.createObjectURL(new Blob([code], { type: 'text/javascript' }));
      }
      if (src) {
        await new Promise((resolve) => {
          script.addEventListener('load', resolve);
          script.addEventListener('error', () => {
            state.errors.push('Failed to load server script ' + src);
            resolve();
          });
          script.src = src;
          placeholder.after(script);
        });
      } else {
        script.textContent = code;
        placeholder.after(script);
      }
      script.remove();
    }
    await new Promise((resolve) => setTimeout(resolve, 0));
  };

  document.addEventListener('DOMContentLoaded', () => {
    run()
      .catch((error) => state.errors.push(describe(error)))
      .finally(() => { state.done = true; });
  });
})();"#;

/// Settings for [`HeadlessRuntime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessConfig {
    pub launch: LaunchConfig,
    /// Budget for loading a page and running its server scripts
    pub load_timeout: Duration,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            launch: LaunchConfig::default(),
            load_timeout: DEFAULT_LOAD_TIMEOUT,
        }
    }
}

/// Runs server-side scripts in headless Chrome.
///
/// Chrome is launched on the first render and shared by later ones; each
/// render gets its own tab.
pub struct HeadlessRuntime {
    config: HeadlessConfig,
    browser: OnceCell<HeadlessBrowser>,
}

impl HeadlessRuntime {
    pub fn new(config: HeadlessConfig) -> Self {
        Self {
            config,
            browser: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &HeadlessConfig {
        &self.config
    }

    async fn browser(&self) -> Result<&HeadlessBrowser, BrowserError> {
        self.browser
            .get_or_try_init(|| async {
                info!("Starting headless Chrome for server scripts");
                HeadlessBrowser::launch(self.config.launch.clone()).await
            })
            .await
    }

    /// Close the shared browser, if it was started.
    pub async fn shutdown(&self) -> Result<(), BrowserError> {
        match self.browser.get() {
            Some(browser) => browser.close().await,
            None => Ok(()),
        }
    }

    async fn execute(&self, request: &ExecutionRequest, scratch: &Path) -> Result<String, RenderError> {
        let relative = scratch
            .strip_prefix(&request.output_dir)
            .map_err(|_| RenderError::Runtime(format!("{} is outside the output directory", scratch.display())))?
            .to_string_lossy()
            .replace('\\', "/");

        let server = StaticServer::start(&request.output_dir).await?;
        let page = self.browser().await?.new_page().await?;
        page.add_init_script(&runner_script()).await?;
        page.navigate(&server.file_url(&relative)?).await?;

        let finished = page
            .wait_until(DONE_EXPRESSION, WaitConfig::with_timeout(self.config.load_timeout))
            .await;
        let errors: Vec<String> = page.evaluate(ERRORS_EXPRESSION).await.unwrap_or_default();

        for message in page.console().messages() {
            debug!(target: "tessel::page", "[{:?}] {}", message.level, message);
        }

        if !errors.is_empty() {
            let _ = page.close().await;
            return Err(RenderError::ServerScript(errors.join("\n")));
        }
        if let Err(e) = finished {
            let _ = page.close().await;
            return Err(e.into());
        }

        page.disable_scripts().await?;
        let html = page.content().await?;
        page.close().await?;
        Ok(html)
    }
}

impl Default for HeadlessRuntime {
    fn default() -> Self {
        Self::new(HeadlessConfig::default())
    }
}

#[async_trait]
impl ScriptRuntime for HeadlessRuntime {
    async fn run(&self, request: ExecutionRequest) -> Result<String, RenderError> {
        let dir = scratch_dir(&request);
        tokio::fs::create_dir_all(&dir).await?;

        // Removed when dropped, whatever the outcome.
        let scratch = tempfile::Builder::new()
            .prefix(".tessel-render-")
            .suffix(".html")
            .tempfile_in(&dir)?;
        tokio::fs::write(scratch.path(), &request.html).await?;

        debug!("Rendering {} through Chrome", request.page.as_deref().unwrap_or("<page>"));
        self.execute(&request, scratch.path()).await
    }
}

/// Directory the prepared page is written to: the page's own directory,
/// so its relative URLs resolve unchanged.
fn scratch_dir(request: &ExecutionRequest) -> PathBuf {
    match request.page.as_deref() {
        Some(page) => request.output_dir.join(site::page_dir(page)),
        None => request.output_dir.clone(),
    }
}

fn runner_script() -> String {
    RUNNER
        .replace("__TAG__", PLACEHOLDER_TAG)
        .replace("__MARKER__", PLACEHOLDER_ATTR)
        .replace("__INLINE__", INLINE_ATTR)
}
