//! # tessel-browser
//!
//! Headless Chrome runtime for server-side scripts, built on
//! chromiumoxide.
//!
//! - **[`HeadlessRuntime`]**: the [`tessel_core::ScriptRuntime`] used by
//!   the dev server
//! - **[`HeadlessBrowser`]**: Chrome process lifecycle
//! - **[`Page`]**: one tab, with console capture
//! - **[`StaticServer`]**: loopback origin the page is loaded from
//!
//! Tests that launch Chrome are `#[ignore]`d; run them with
//! `cargo test -p tessel-browser -- --ignored`.
//!
//! ```ignore
//! use std::sync::Arc;
//! use tessel_browser::HeadlessRuntime;
//! use tessel_core::PageExecutor;
//!
//! let executor = PageExecutor::new().with_runtime(Arc::new(HeadlessRuntime::default()));
//! let html = executor.render_page(&page_html, &output_dir, Some("index.html")).await?;
//! ```

pub mod browser;
pub mod console;
pub mod error;
pub mod page;
pub mod runtime;
pub mod server;
pub mod wait;

pub use browser::{HeadlessBrowser, LaunchConfig};
pub use console::{ConsoleCapture, ConsoleLevel, ConsoleMessage};
pub use error::{BrowserError, Result};
pub use page::Page;
pub use runtime::{DEFAULT_LOAD_TIMEOUT, HeadlessConfig, HeadlessRuntime};
pub use server::StaticServer;
pub use wait::WaitConfig;
