//! Site layout: the page manifest and site-relative paths.
//!
//! Paths inside a site are plain `/`-separated strings relative to the
//! site root (`docs/intro.html`). They are resolved lexically and never
//! allowed to climb above the root.

use crate::error::ConfigError;
use std::path::Path;

/// Manifest listing the pages of a site, one per line.
pub const SITEMAP: &str = "sitemap.txt";

/// Page built when a site has no manifest.
pub const DEFAULT_PAGE: &str = "index.html";

/// Resolve `reference` against the site directory `base_dir`.
///
/// A leading `/` resolves from the site root. Query strings and
/// fragments are dropped. Returns `None` for absolute URLs, for paths
/// that climb above the root, and for references that name the root
/// itself.
///
/// # Examples
///
/// ```
/// use tessel_core::site::resolve_site_path;
///
/// assert_eq!(resolve_site_path("docs", "./a.js").as_deref(), Some("docs/a.js"));
/// assert_eq!(resolve_site_path("docs", "../lib/b.ts").as_deref(), Some("lib/b.ts"));
/// assert_eq!(resolve_site_path("docs", "/c.js").as_deref(), Some("c.js"));
/// assert_eq!(resolve_site_path("", "../escape.js"), None);
/// ```
pub fn resolve_site_path(base_dir: &str, reference: &str) -> Option<String> {
    if reference.contains("://") || reference.starts_with("//") || reference.starts_with("data:") {
        return None;
    }

    let reference = reference.split(['?', '#']).next().unwrap_or_default();
    let (base, rest) = match reference.strip_prefix('/') {
        Some(rooted) => ("", rooted),
        None => (base_dir, reference),
    };

    let mut parts: Vec<&str> = base.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            name => parts.push(name),
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Directory part of a site-relative page path (`docs/a.html` → `docs`).
pub fn page_dir(page: &str) -> &str {
    page.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Parse a manifest into site-relative page paths.
///
/// Lines are trimmed; blank lines and `#` comments are skipped. An empty
/// manifest falls back to [`DEFAULT_PAGE`].
///
/// # Errors
///
/// Returns [`ConfigError::InvalidManifest`] for a line that resolves
/// outside the site.
pub fn parse_manifest(text: &str) -> Result<Vec<String>, ConfigError> {
    let mut pages = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let page = resolve_site_path("", line).ok_or_else(|| ConfigError::InvalidManifest {
            entry: line.to_string(),
            reason: "path must stay inside the site".to_string(),
        })?;
        if !pages.contains(&page) {
            pages.push(page);
        }
    }

    if pages.is_empty() {
        pages.push(DEFAULT_PAGE.to_string());
    }
    Ok(pages)
}

/// Read the manifest of the site at `root`, defaulting to [`DEFAULT_PAGE`].
pub async fn read_manifest(root: &Path) -> Result<Vec<String>, crate::error::BuildError> {
    match tokio::fs::read_to_string(root.join(SITEMAP)).await {
        Ok(text) => Ok(parse_manifest(&text)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(vec![DEFAULT_PAGE.to_string()]),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_drops_query_and_fragment() {
        assert_eq!(resolve_site_path("", "app.js?v=2#top").as_deref(), Some("app.js"));
    }

    #[test]
    fn test_resolve_rejects_urls() {
        assert_eq!(resolve_site_path("", "https://cdn.example/x.js"), None);
        assert_eq!(resolve_site_path("", "//cdn.example/x.js"), None);
    }

    #[test]
    fn test_page_dir() {
        assert_eq!(page_dir("index.html"), "");
        assert_eq!(page_dir("docs/guide/a.html"), "docs/guide");
    }

    #[test]
    fn test_parse_manifest() {
        let pages = parse_manifest("index.html\n\n# drafts\n ./about.html \nindex.html\n").unwrap();
        assert_eq!(pages, vec!["index.html", "about.html"]);
    }

    #[test]
    fn test_empty_manifest_defaults_to_index() {
        assert_eq!(parse_manifest("\n\n").unwrap(), vec![DEFAULT_PAGE]);
    }

    #[test]
    fn test_manifest_rejects_escape() {
        assert!(matches!(
            parse_manifest("../secret.html"),
            Err(ConfigError::InvalidManifest { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_manifest_defaults_to_index() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_manifest(dir.path()).await.unwrap(), vec![DEFAULT_PAGE]);
    }
}
