//! Page execution: the last step before a page is served.
//!
//! [`PageExecutor::render`] runs four stages in a fixed order, each one
//! taking and returning serialized HTML:
//!
//! 1. remove development-only elements (`dev-only` attribute);
//! 2. expand `<trans-md>` markdown blocks ([`markdown`]);
//! 3. expand `<trans-inc>` include tags ([`include`]);
//! 4. run server-side scripts through a [`ScriptRuntime`] ([`scripts`]).
//!
//! Any failure aborts the render; no partially rendered page is returned.

pub mod include;
pub mod markdown;
pub mod scripts;

use crate::dom::{self, Document};
use crate::error::RenderError;
use crate::site::resolve_site_path;
use markup5ever_rcdom::Handle;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub use scripts::{ExecutionRequest, ScriptRuntime, ScriptTarget};

/// Renders built pages.
#[derive(Clone, Default)]
pub struct PageExecutor {
    runtime: Option<Arc<dyn ScriptRuntime>>,
}

impl PageExecutor {
    /// Executor without a script runtime. Pages with server-side scripts
    /// fail with [`RenderError::NoRuntime`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_runtime(mut self, runtime: Arc<dyn ScriptRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Render `html` whose includes live in `output_dir`.
    pub async fn render(&self, html: &str, output_dir: &Path) -> Result<String, RenderError> {
        self.render_page(html, output_dir, None).await
    }

    /// Render the site-relative page `page` of `output_dir`. The page path
    /// lets the script runtime load the page from its own directory so
    /// relative script URLs keep working.
    pub async fn render_page(
        &self,
        html: &str,
        output_dir: &Path,
        page: Option<&str>,
    ) -> Result<String, RenderError> {
        let html = strip_dev_only(html);
        let html = markdown::expand_markdown(html, output_dir).await?;
        let html = include::expand_includes(html, output_dir).await?;
        scripts::run_server_scripts(html, output_dir, page, self.runtime.as_deref()).await
    }
}

/// Remove every element carrying the `dev-only` attribute.
pub fn strip_dev_only(html: &str) -> String {
    let doc = Document::parse(html);
    let dev_only: Vec<Handle> = doc
        .elements()
        .into_iter()
        .filter(|el| dom::has_attr(el, "dev-only"))
        .collect();
    if dev_only.is_empty() {
        return html.to_string();
    }

    debug!("Removing {} dev-only elements", dev_only.len());
    for element in &dev_only {
        dom::remove(element);
    }
    doc.to_html()
}

/// Run `inspect` over every `tag` element in document order.
pub(crate) fn collect_tags<T>(html: &str, tag: &str, inspect: impl Fn(&Handle) -> T) -> Vec<T> {
    let doc = Document::parse(html);
    doc.elements_by_tag(tag).iter().map(inspect).collect()
}

/// Replace the `tag` elements of `html` with the given fragments, in
/// document order. `None` leaves an element untouched.
pub(crate) fn replace_tags(html: &str, tag: &str, fragments: Vec<Option<String>>) -> String {
    let doc = Document::parse(html);
    for (element, fragment) in doc.elements_by_tag(tag).iter().zip(fragments) {
        if let Some(fragment) = fragment {
            dom::replace_with(element, dom::parse_fragment_nodes(&fragment));
        }
    }
    doc.to_html()
}

/// Read `src` relative to the output directory.
pub(crate) async fn read_relative(output_dir: &Path, src: &str) -> Result<String, RenderError> {
    let relative = resolve_site_path("", src).ok_or_else(|| RenderError::MissingInclude(PathBuf::from(src)))?;
    let path = output_dir.join(relative);
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RenderError::MissingInclude(path)),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_dev_only() {
        let html = r#"<html><head><script dev-only src="reload.js"></script></head><body><p dev-only>debug</p><p>kept</p></body></html>"#;
        let out = strip_dev_only(html);
        assert!(!out.contains("reload.js"));
        assert!(!out.contains("debug"));
        assert!(out.contains("<p>kept</p>"));
    }

    #[test]
    fn test_strip_dev_only_without_matches_is_identity() {
        let html = "<p>unchanged</p>";
        assert_eq!(strip_dev_only(html), html);
    }

    #[tokio::test]
    async fn test_read_relative_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_relative(dir.path(), "../../etc/passwd").await.unwrap_err();
        assert!(matches!(err, RenderError::MissingInclude(_)));
    }
}
