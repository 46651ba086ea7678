//! Module source fetching for `file://` and `http(s)://` URLs.

use crate::error::ResolutionError;
use async_trait::async_trait;
use tracing::trace;
use url::Url;

/// Loads the source text of a canonical module URL.
#[async_trait]
pub trait ModuleFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String, ResolutionError>;
}

/// Fetcher for local files and HTTP(S) URLs.
#[derive(Debug, Clone, Default)]
pub struct DefaultFetcher {
    client: reqwest::Client,
}

impl DefaultFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_file(&self, url: &Url) -> Result<String, ResolutionError> {
        let path = url
            .to_file_path()
            .map_err(|()| fetch_error(url, "not a local file path"))?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| fetch_error(url, e))
    }

    async fn fetch_http(&self, url: &Url) -> Result<String, ResolutionError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| fetch_error(url, e))?;
        response.text().await.map_err(|e| fetch_error(url, e))
    }
}

#[async_trait]
impl ModuleFetcher for DefaultFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, ResolutionError> {
        trace!("Fetching module {}", url);
        match url.scheme() {
            "file" => self.fetch_file(url).await,
            "http" | "https" => self.fetch_http(url).await,
            scheme => Err(fetch_error(url, format!("unsupported scheme '{scheme}'"))),
        }
    }
}

fn fetch_error(url: &Url, reason: impl ToString) -> ResolutionError {
    ResolutionError::Fetch {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}
