//! tessel CLI - serves a directory of HTML pages through the tessel
//! pipeline.
//!
//! Each request picks a build configuration from the browser's user
//! agent, makes sure that build exists, then renders the requested page
//! (markdown, includes, server-side scripts) before responding.
//!
//! - [`cli`] - clap argument definitions
//! - [`config`] - `tessel.config.json` + `TESSEL_*` + flags, merged with figment
//! - [`server`] - the axum request handler
//! - [`commands`] - `serve`, `build`, `render`, `fetch` and `resolve`
//! - [`error`], [`logger`], [`ui`] - reporting

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logger;
pub mod server;
pub mod ui;

pub use config::TesselConfig;
pub use error::{CliError, ConfigError, Result, ResultExt};
