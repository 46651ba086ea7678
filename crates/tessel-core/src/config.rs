//! Build configuration and cache keys.
//!
//! A [`BuildConfiguration`] names one build of a site: which source tree,
//! which browser the bundles target, and whether the result should be
//! invalidated when sources change. Two configurations are the same build
//! exactly when their canonical serialized forms are equal, and that form
//! is the [`CacheKey`].

use once_cell::sync::Lazy;
use path_clean::PathClean;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Target used when a user agent matches none of the known browsers.
pub const DEFAULT_TARGET_BROWSER: &str = "chrome80";

/// Immutable description of one build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildConfiguration {
    source_root: PathBuf,
    target_browser: String,
    watch: bool,
}

impl BuildConfiguration {
    /// Create a configuration.
    ///
    /// The source root is cleaned lexically (`a/./b/../c` becomes `a/c`)
    /// so that spellings of the same directory share a cache entry.
    pub fn new(source_root: impl Into<PathBuf>, target_browser: impl Into<String>, watch: bool) -> Self {
        Self {
            source_root: source_root.into().clean(),
            target_browser: target_browser.into(),
            watch,
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn target_browser(&self) -> &str {
        &self.target_browser
    }

    pub fn watch(&self) -> bool {
        self.watch
    }

    /// Canonical serialized form, used as the cache key.
    pub fn cache_key(&self) -> CacheKey {
        // Field order is fixed by the struct, so the JSON is canonical.
        let serialized = serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{}|{}|{}",
                self.source_root.display(),
                self.target_browser,
                self.watch
            )
        });
        CacheKey(serialized)
    }
}

/// Key identifying one cached build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short blake3 digest of the key, for log lines and directory names.
    pub fn digest(&self) -> String {
        let hash = blake3::hash(self.0.as_bytes()).to_hex();
        hash[..12].to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

static SAFARI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d+)\.\d+\.\d+ Safari/").expect("valid Safari pattern"));
static CHROME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" Chrome/(\d+)").expect("valid Chrome pattern"));
static FIREFOX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" Firefox/(\d+)").expect("valid Firefox pattern"));

/// Derive the bundler target from a `User-Agent` header.
///
/// Patterns are tried in priority order: Safari, then Chrome, then
/// Firefox. The first match yields `<browser><major>` (e.g. `safari13`);
/// no match yields `default`.
///
/// # Examples
///
/// ```
/// use tessel_core::config::target_browser_from_user_agent;
///
/// let ua = "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/115.0";
/// assert_eq!(target_browser_from_user_agent(Some(ua), "chrome80"), "firefox115");
/// assert_eq!(target_browser_from_user_agent(None, "chrome80"), "chrome80");
/// ```
pub fn target_browser_from_user_agent(user_agent: Option<&str>, default: &str) -> String {
    let Some(ua) = user_agent else {
        return default.to_string();
    };

    let patterns: [(&str, &Lazy<Regex>); 3] =
        [("safari", &SAFARI), ("chrome", &CHROME), ("firefox", &FIREFOX)];

    for (browser, pattern) in patterns {
        if let Some(major) = pattern.captures(ua).and_then(|c| c.get(1)) {
            return format!("{browser}{}", major.as_str());
        }
    }

    default.to_string()
}
