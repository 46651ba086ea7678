//! Serving a built site to the browser.
//!
//! Pages are rendered from a real HTTP origin rather than `file://` so
//! relative and root-relative script URLs resolve the way they do when
//! the dev server serves the page.

use crate::error::{BrowserError, Result};
use axum::Router;
use std::net::SocketAddr;
use std::path::Path;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::services::ServeDir;
use tracing::{debug, warn};
use url::Url;

/// Ephemeral static file server on a loopback port, shut down on drop.
pub struct StaticServer {
    addr: SocketAddr,
    base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
}

impl StaticServer {
    /// Serve `root` on `127.0.0.1` with an OS-assigned port.
    pub async fn start(root: &Path) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;
        let app = Router::new().fallback_service(ServeDir::new(root));

        let (shutdown, signal) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = signal.await;
            });
            if let Err(e) = server.await {
                warn!("Render server on {} failed: {}", addr, e);
            }
        });

        debug!("Serving {} on {}", root.display(), addr);
        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            shutdown: Some(shutdown),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL of a site-relative file path, percent-encoding as needed.
    pub fn file_url(&self, path: &str) -> Result<String> {
        let base = Url::parse(&format!("{}/", self.base_url))
            .map_err(|e| BrowserError::NavigationFailed {
                url: self.base_url.clone(),
                reason: e.to_string(),
            })?;
        base.join(path.trim_start_matches('/'))
            .map(String::from)
            .map_err(|e| BrowserError::NavigationFailed {
                url: path.to_string(),
                reason: e.to_string(),
            })
    }
}

impl Drop for StaticServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn serves_files_from_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("blog")).unwrap();
        std::fs::write(dir.path().join("blog/post.html"), "<p>post</p>").unwrap();

        let server = StaticServer::start(dir.path()).await.unwrap();
        let response = get(server.addr(), "/blog/post.html").await;

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("<p>post</p>"));

        let missing = get(server.addr(), "/nope.html").await;
        assert!(missing.starts_with("HTTP/1.1 404"));
    }

    #[tokio::test]
    async fn file_urls_are_encoded() {
        let dir = tempfile::tempdir().unwrap();
        let server = StaticServer::start(dir.path()).await.unwrap();
        let url = server.file_url("my docs/a page.html").unwrap();
        assert_eq!(url, format!("http://{}/my%20docs/a%20page.html", server.addr()));
    }
}
