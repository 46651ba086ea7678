//! Tag rewriter: authoring-time markup to bundler-ready markup.
//!
//! One pass over a page:
//!
//! 1. Collect import-map sources in document order: every
//!    `<link rel="importmap" href>` in `<head>` (loaded and parsed), then
//!    every `<link rel="package">` declaration (removed from the page).
//!    The sources are folded left to right into the page's [`ImportMap`].
//! 2. Replace every `<bundle-script>` with a `<script>` pointing at the
//!    bundle the bundler will write next to the entry
//!    (`<entry>.bundle.js`). Inline code becomes a synthesized entry
//!    named after a hash of its content.
//!
//! Loading linked import maps is the only asynchronous step, so it runs
//! first against a throwaway parse; the rewrite itself is
//! [`rewrite_with_import_maps`], a pure function of the page text.

use crate::dom::{self, Document};
use crate::error::ConfigError;
use crate::import_map::{ImportMap, PackageSpec};
use crate::site::{self, resolve_site_path};
use async_trait::async_trait;
use futures::future::try_join_all;
use indexmap::IndexSet;
use markup5ever_rcdom::Handle;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// Entry point handed to the bundler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BundleEntry {
    path: String,
    synthesized: bool,
}

impl BundleEntry {
    /// Entry naming a source file of the site.
    pub fn source(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            synthesized: false,
        }
    }

    /// Entry for inline code written out by the orchestrator.
    pub fn synthesized(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            synthesized: true,
        }
    }

    /// Site-relative path of the entry source.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_synthesized(&self) -> bool {
        self.synthesized
    }

    /// Site-relative path of the bundle the bundler writes for this entry.
    pub fn bundle_path(&self) -> String {
        format!("{}.bundle.js", self.path)
    }
}

/// Inline `<bundle-script>` code that must exist on disk before bundling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InlineScriptPayload {
    /// Site-relative path the code is written to
    pub synthetic_path: String,
    /// Script source text
    pub source: String,
}

/// Result of rewriting one page.
#[derive(Debug, Clone, Default)]
pub struct RewriteOutput {
    /// Rewritten HTML
    pub html: String,
    /// Bundle entries, in document order without duplicates
    pub entries: Vec<BundleEntry>,
    /// `name@version` specifiers of the page's folded import map
    pub dependencies: Vec<String>,
    /// Inline code to materialize before bundling
    pub payloads: Vec<InlineScriptPayload>,
    /// The folded import map itself
    pub import_map: ImportMap,
}

/// Where a linked import map lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceLocation {
    /// `http(s)://` document
    Remote(Url),
    /// File inside the staged site
    Local(PathBuf),
}

/// Loads linked import map documents.
#[async_trait]
pub trait ResourceLoader: Send + Sync {
    async fn load(&self, location: &ResourceLocation) -> Result<String, ConfigError>;
}

/// Loader reading local files with tokio and remote documents with reqwest.
#[derive(Debug, Clone, Default)]
pub struct DefaultResourceLoader {
    client: reqwest::Client,
}

impl DefaultResourceLoader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceLoader for DefaultResourceLoader {
    async fn load(&self, location: &ResourceLocation) -> Result<String, ConfigError> {
        match location {
            ResourceLocation::Remote(url) => {
                let unavailable = |reason: String| ConfigError::ImportMapUnavailable {
                    href: url.to_string(),
                    reason,
                };
                let response = self
                    .client
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(|e| unavailable(e.to_string()))?;
                let response = response.error_for_status().map_err(|e| unavailable(e.to_string()))?;
                response.text().await.map_err(|e| unavailable(e.to_string()))
            }
            ResourceLocation::Local(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| ConfigError::ImportMapUnavailable {
                        href: path.display().to_string(),
                        reason: e.to_string(),
                    })
            }
        }
    }
}

/// Rewrite one page of the site rooted at `site_root`.
///
/// `page` is the site-relative path of the page; relative references on
/// the page resolve against its directory.
///
/// # Errors
///
/// Fails the whole rewrite if any linked import map cannot be loaded or
/// is malformed, if a package declaration is incomplete, or if a
/// `<bundle-script src>` points outside the site.
pub async fn rewrite_page(
    html: &str,
    page: &str,
    site_root: &Path,
    loader: &dyn ResourceLoader,
) -> Result<RewriteOutput, ConfigError> {
    let hrefs = {
        let doc = Document::parse(html);
        import_map_links(&doc)
            .iter()
            .filter_map(|link| dom::attr(link, "href"))
            .collect::<Vec<_>>()
    };

    let loads = hrefs.iter().map(|href| async move {
        let location = locate(site_root, page, href)?;
        debug!("Loading import map {} for {}", href, page);
        let text = loader.load(&location).await?;
        ImportMap::from_json(href, &text)
    });
    let linked = try_join_all(loads).await?;

    rewrite_with_import_maps(html, page, linked)
}

/// Synchronous half of [`rewrite_page`], given the already-loaded linked
/// import maps in document order.
pub fn rewrite_with_import_maps(
    html: &str,
    page: &str,
    linked: Vec<ImportMap>,
) -> Result<RewriteOutput, ConfigError> {
    let doc = Document::parse(html);

    let mut maps = linked;
    for link in package_links(&doc) {
        maps.push(package_declaration(&link)?);
        dom::remove(&link);
    }
    let import_map = ImportMap::fold(maps);

    let base_dir = site::page_dir(page);
    let mut entries = IndexSet::new();
    let mut payloads = IndexSet::new();

    for element in doc.elements_by_tag("bundle-script") {
        let src = dom::attr(&element, "src").filter(|s| !s.trim().is_empty());

        let script_src = match src {
            Some(src) => {
                let path = resolve_site_path(base_dir, &src).ok_or_else(|| ConfigError::InvalidEntry {
                    page: page.to_string(),
                    src: src.clone(),
                })?;
                entries.insert(BundleEntry::source(path));
                bundle_src(&src)
            }
            None => {
                let source = dom::text_content(&element);
                if source.trim().is_empty() {
                    dom::remove(&element);
                    continue;
                }
                let name = synthesized_name(&source);
                let path = join_site_path(base_dir, &name);
                entries.insert(BundleEntry::synthesized(path.clone()));
                payloads.insert(InlineScriptPayload {
                    synthetic_path: path,
                    source,
                });
                format!("./{name}.bundle.js")
            }
        };

        let side = dom::attr(&element, "side")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "client".to_string());
        let script = dom::create_element("script", &[("src", script_src.as_str()), ("side", side.as_str())]);
        if dom::has_attr(&element, "defer") {
            dom::set_attr(&script, "defer", "");
        }
        dom::replace_with(&element, vec![script]);
    }

    debug!(
        "Rewrote {}: {} entries, {} packages",
        page,
        entries.len(),
        import_map.len()
    );

    Ok(RewriteOutput {
        html: doc.to_html(),
        entries: entries.into_iter().collect(),
        dependencies: import_map.dependencies(),
        payloads: payloads.into_iter().collect(),
        import_map,
    })
}

/// Emitted `src` for an entry reference: the bundle suffix goes on the
/// path, any query or fragment follows it.
fn bundle_src(src: &str) -> String {
    match src.find(['?', '#']) {
        Some(at) => format!("{}.bundle.js{}", &src[..at], &src[at..]),
        None => format!("{src}.bundle.js"),
    }
}

/// File name for inline code: a content hash, unique within a build.
fn synthesized_name(source: &str) -> String {
    let hash = blake3::hash(source.as_bytes()).to_hex();
    format!("inline-{}.js", &hash[..16])
}

fn join_site_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

fn rel_tokens(link: &Handle) -> Vec<String> {
    dom::attr(link, "rel")
        .map(|rel| rel.split_whitespace().map(str::to_ascii_lowercase).collect())
        .unwrap_or_default()
}

fn head_links(doc: &Document) -> Vec<Handle> {
    let Some(head) = doc.head() else {
        return Vec::new();
    };
    dom::descendants(&head)
        .into_iter()
        .filter(|node| dom::tag_name(node) == Some("link"))
        .collect()
}

fn import_map_links(doc: &Document) -> Vec<Handle> {
    head_links(doc)
        .into_iter()
        .filter(|link| rel_tokens(link).iter().any(|t| t == "importmap") && dom::has_attr(link, "href"))
        .collect()
}

fn package_links(doc: &Document) -> Vec<Handle> {
    head_links(doc)
        .into_iter()
        .filter(|link| rel_tokens(link).iter().any(|t| t == "package"))
        .collect()
}

fn package_declaration(link: &Handle) -> Result<ImportMap, ConfigError> {
    let name = dom::attr(link, "name")
        .filter(|n| !n.is_empty())
        .ok_or(ConfigError::InvalidPackageDeclaration { attribute: "name" })?;
    let version = dom::attr(link, "version")
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::InvalidPackageDeclaration { attribute: "version" })?;

    let global = dom::attr(link, "global")
        .filter(|g| !g.is_empty())
        .ok_or(ConfigError::InvalidPackageDeclaration { attribute: "global" })?;
    let url = dom::attr(link, "href")
        .filter(|h| !h.is_empty())
        .ok_or(ConfigError::InvalidPackageDeclaration { attribute: "href" })?;

    Ok(ImportMap::single(name, PackageSpec { global, version, url }))
}

fn locate(site_root: &Path, page: &str, href: &str) -> Result<ResourceLocation, ConfigError> {
    if href.starts_with("http://") || href.starts_with("https://") {
        let url = Url::parse(href).map_err(|e| ConfigError::ImportMapUnavailable {
            href: href.to_string(),
            reason: e.to_string(),
        })?;
        return Ok(ResourceLocation::Remote(url));
    }

    let path = resolve_site_path(site::page_dir(page), href).ok_or_else(|| {
        ConfigError::ImportMapUnavailable {
            href: href.to_string(),
            reason: "path must stay inside the site".to_string(),
        }
    })?;
    Ok(ResourceLocation::Local(site_root.join(path)))
}
