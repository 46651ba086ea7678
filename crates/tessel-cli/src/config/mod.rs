//! CLI configuration.
//!
//! Sources, lowest priority first:
//!
//! 1. built-in defaults
//! 2. `tessel.config.json` in the working directory, or `--config <file>`
//! 3. `TESSEL_*` environment variables; nested keys use `__`
//!    (`TESSEL_HEADLESS__CHROME_PATH`)
//! 4. command-line flags
//!
//! ```json
//! {
//!   "root": "site",
//!   "port": 3000,
//!   "default_browser": "chrome80",
//!   "bundler": { "minify": false },
//!   "headless": { "load_timeout_ms": 10000 }
//! }
//! ```

mod loading;
#[cfg(test)]
mod tests;
mod validation;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tessel_browser::{HeadlessConfig, LaunchConfig};
use tessel_core::{BuildConfiguration, BundlerOptions, DEFAULT_TARGET_BROWSER};

pub use loading::{CONFIG_FILE, ConfigOverrides, HeadlessOverrides};
pub use validation::validate_browser_target;

/// Merged configuration for every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesselConfig {
    /// Site directory holding the HTML pages
    pub root: PathBuf,
    pub host: String,
    pub port: u16,
    /// Bundle target when a user agent matches no known browser
    pub default_browser: String,
    /// Invalidate builds when their sources change
    pub watch: bool,
    /// Where `tessel fetch` keeps downloaded trees
    pub cache_dir: PathBuf,
    pub bundler: BundlerConfig,
    pub headless: HeadlessSettings,
}

/// npm and esbuild settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundlerConfig {
    pub npm: PathBuf,
    pub esbuild: Option<PathBuf>,
    pub minify: bool,
    pub sourcemap: bool,
}

/// Headless Chrome settings for server-side scripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadlessSettings {
    pub chrome_path: Option<PathBuf>,
    pub load_timeout_ms: u64,
}

impl Default for TesselConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            host: "127.0.0.1".to_string(),
            port: 3000,
            default_browser: DEFAULT_TARGET_BROWSER.to_string(),
            watch: true,
            cache_dir: std::env::temp_dir().join("tessel-sources"),
            bundler: BundlerConfig::default(),
            headless: HeadlessSettings::default(),
        }
    }
}

impl Default for BundlerConfig {
    fn default() -> Self {
        let options = BundlerOptions::default();
        Self {
            npm: options.npm,
            esbuild: options.esbuild,
            minify: options.minify,
            sourcemap: options.sourcemap,
        }
    }
}

impl Default for HeadlessSettings {
    fn default() -> Self {
        Self {
            chrome_path: None,
            load_timeout_ms: tessel_browser::DEFAULT_LOAD_TIMEOUT.as_millis() as u64,
        }
    }
}

impl TesselConfig {
    /// `host:port` to bind.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Build of the configured root for `target_browser`.
    pub fn build_configuration(&self, target_browser: impl Into<String>) -> BuildConfiguration {
        BuildConfiguration::new(&self.root, target_browser, self.watch)
    }

    pub fn bundler_options(&self) -> BundlerOptions {
        BundlerOptions {
            npm: self.bundler.npm.clone(),
            esbuild: self.bundler.esbuild.clone(),
            minify: self.bundler.minify,
            sourcemap: self.bundler.sourcemap,
        }
    }

    pub fn headless_config(&self) -> HeadlessConfig {
        let mut launch = LaunchConfig::default();
        if let Some(path) = &self.headless.chrome_path {
            launch = launch.with_chrome_path(path);
        }
        HeadlessConfig {
            launch,
            load_timeout: Duration::from_millis(self.headless.load_timeout_ms),
        }
    }
}
