//! The request handler.
//!
//! Every request goes through the same steps:
//!
//! 1. map the URL path onto a site-relative file (`/` and `dir/` become
//!    `index.html`; paths climbing out of the site are refused)
//! 2. pick the bundle target from the `User-Agent` header and make sure
//!    that build exists
//! 3. render HTML pages of the build through the page executor when the
//!    request accepts `text/html`
//! 4. serve anything else from the build output as a static file
//!
//! Build and render failures answer 500 with the error text; nothing is
//! ever served from a half-finished build.

use crate::config::TesselConfig;
use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use std::path::Path;
use std::sync::Arc;
use tessel_core::site::{DEFAULT_PAGE, resolve_site_path};
use tessel_core::{Builder, PageExecutor, target_browser_from_user_agent};
use tracing::{debug, error};

/// Shared by every request.
#[derive(Clone)]
pub struct AppState {
    builder: Arc<Builder>,
    executor: Arc<PageExecutor>,
    config: Arc<TesselConfig>,
}

impl AppState {
    pub fn new(builder: Arc<Builder>, executor: Arc<PageExecutor>, config: TesselConfig) -> Self {
        Self {
            builder,
            executor,
            config: Arc::new(config),
        }
    }

    pub fn builder(&self) -> &Arc<Builder> {
        &self.builder
    }
}

/// Router sending every path to [`handle_request`].
pub fn router(state: AppState) -> Router {
    Router::new().fallback(handle_request).with_state(state)
}

/// Build, render and serve one request.
pub async fn handle_request(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    let Some(path) = request_path(uri.path()) else {
        return not_found(uri.path());
    };

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok());
    let target = target_browser_from_user_agent(user_agent, &state.config.default_browser);
    let configuration = state.config.build_configuration(target);

    let build = match state.builder.ensure_built(&configuration).await {
        Ok(build) => build,
        Err(e) => {
            error!("Build for {} failed: {}", configuration.target_browser(), e);
            return server_error(&e);
        }
    };

    let file = build.output_dir.join(&path);
    if !is_file(&file).await {
        return not_found(uri.path());
    }

    if is_html(&path) && accepts_html(&headers) {
        debug!("Rendering {} for {}", path, configuration.target_browser());
        let html = match tokio::fs::read_to_string(&file).await {
            Ok(html) => html,
            Err(e) => return server_error(&e),
        };
        return match state
            .executor
            .render_page(&html, &build.output_dir, Some(&path))
            .await
        {
            Ok(rendered) => (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/html; charset=utf-8"),
                    (header::CACHE_CONTROL, "no-cache"),
                ],
                rendered,
            )
                .into_response(),
            Err(e) => {
                error!("Rendering {} failed: {}", path, e);
                server_error(&e)
            }
        };
    }

    match tokio::fs::read(&file).await {
        Ok(content) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, determine_content_type(&path)),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            content,
        )
            .into_response(),
        Err(e) => server_error(&e),
    }
}

/// Site-relative file for a URL path, or `None` when it names the site
/// root itself or climbs out of it.
///
/// # Examples
///
/// ```
/// use tessel_cli::server::request_path;
///
/// assert_eq!(request_path("/").as_deref(), Some("index.html"));
/// assert_eq!(request_path("/docs/").as_deref(), Some("docs/index.html"));
/// assert_eq!(request_path("/a%20b.js").as_deref(), Some("a b.js"));
/// assert_eq!(request_path("/../secret"), None);
/// ```
pub fn request_path(raw: &str) -> Option<String> {
    let decoded = urlencoding::decode(raw).ok()?;
    if decoded.contains('\\') {
        return None;
    }
    let path = if decoded.ends_with('/') {
        format!("{decoded}{DEFAULT_PAGE}")
    } else {
        decoded.into_owned()
    };
    resolve_site_path("", &path)
}

fn accepts_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

fn is_html(path: &str) -> bool {
    matches!(extension(path), "html" | "htm")
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

fn extension(path: &str) -> &str {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
}

/// Content type from the file extension.
pub fn determine_content_type(path: &str) -> &'static str {
    match extension(path) {
        "html" | "htm" => "text/html; charset=utf-8",
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "css" => "text/css",
        "txt" | "md" => "text/plain; charset=utf-8",
        "wasm" => "application/wasm",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        _ => "application/octet-stream",
    }
}

fn not_found(path: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("File not found: {path}"),
    )
        .into_response()
}

fn server_error(err: &dyn std::fmt::Display) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        err.to_string(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_path_maps_directories_to_index() {
        assert_eq!(request_path("/").as_deref(), Some("index.html"));
        assert_eq!(request_path("/blog/").as_deref(), Some("blog/index.html"));
        assert_eq!(request_path("/blog/post.html").as_deref(), Some("blog/post.html"));
        assert_eq!(request_path("/app.js.bundle.js").as_deref(), Some("app.js.bundle.js"));
    }

    #[test]
    fn test_request_path_refuses_traversal() {
        assert_eq!(request_path("/../etc/passwd"), None);
        assert_eq!(request_path("/a/../../etc/passwd"), None);
        assert_eq!(request_path("/%2e%2e/etc/passwd"), None);
        assert_eq!(request_path("/..%5c..%5cwindows"), None);
    }

    #[test]
    fn test_request_path_normalizes_dots() {
        assert_eq!(request_path("/a/./b/../c.js").as_deref(), Some("a/c.js"));
    }

    #[test]
    fn test_content_types() {
        assert_eq!(determine_content_type("index.html"), "text/html; charset=utf-8");
        assert_eq!(determine_content_type("app.js.bundle.js"), "application/javascript");
        assert_eq!(determine_content_type("app.js.bundle.js.map"), "application/json");
        assert_eq!(determine_content_type("logo.svg"), "image/svg+xml");
        assert_eq!(determine_content_type("LICENSE"), "application/octet-stream");
    }

    #[test]
    fn test_accepts_html() {
        let mut headers = HeaderMap::new();
        assert!(!accepts_html(&headers));
        headers.insert(header::ACCEPT, "application/json".parse().unwrap());
        assert!(!accepts_html(&headers));
        headers.insert(
            header::ACCEPT,
            "text/html,application/xhtml+xml,*/*;q=0.8".parse().unwrap(),
        );
        assert!(accepts_html(&headers));
    }

    #[test]
    fn test_is_html() {
        assert!(is_html("index.html"));
        assert!(is_html("old/page.htm"));
        assert!(!is_html("app.js"));
    }
}
