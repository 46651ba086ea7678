//! Remote source acquisition.
//!
//! A repository branch is resolved to its head commit, and the commit's
//! tarball is extracted into `<cache_dir>/<owner>_<name>/<sha>`. The
//! directory is content addressed by the commit, so an existing one is
//! reused without downloading again.

use crate::error::SourceError;
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// GitHub REST API root.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("tessel/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct Commit {
    sha: Option<String>,
}

/// Downloads and caches repository snapshots.
#[derive(Debug, Clone)]
pub struct RemoteSource {
    client: reqwest::Client,
    cache_dir: PathBuf,
    api_base: String,
}

impl RemoteSource {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache_dir: cache_dir.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Use another API root (GitHub Enterprise, test servers).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Local directory holding `repository` at the head of `branch`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidRepository`] for names not of the
    /// form `owner/name`, HTTP errors from the API, and
    /// [`SourceError::MalformedArchive`] if the tarball cannot be unpacked.
    pub async fn acquire(&self, repository: &str, branch: &str) -> Result<PathBuf, SourceError> {
        let (owner, name) = split_repository(repository)?;
        let sha = self.head_commit(repository, branch).await?;

        let target = self.cache_dir.join(format!("{owner}_{name}")).join(&sha);
        if tokio::fs::try_exists(&target).await? {
            debug!("Reusing {} at {}", repository, target.display());
            return Ok(target);
        }

        info!("Downloading {}@{} ({})", repository, branch, &sha[..sha.len().min(7)]);
        let url = format!("{}/repos/{repository}/tarball/{sha}", self.api_base);
        let archive = self.get(&url).await?.bytes().await?;

        let cache_dir = self.cache_dir.clone();
        let label = repository.to_string();
        let target_dir = target.clone();
        tokio::task::spawn_blocking(move || unpack_into(&archive[..], &cache_dir, &target_dir, &label))
            .await
            .map_err(|e| SourceError::Io(std::io::Error::other(e)))??;

        Ok(target)
    }

    async fn head_commit(&self, repository: &str, branch: &str) -> Result<String, SourceError> {
        let url = format!("{}/repos/{repository}/commits/{branch}", self.api_base);
        let commit: Commit = self.get(&url).await?.json().await?;
        commit
            .sha
            .filter(|sha| !sha.is_empty() && sha.chars().all(|c| c.is_ascii_alphanumeric()))
            .ok_or_else(|| SourceError::MissingCommit {
                repository: repository.to_string(),
                branch: branch.to_string(),
            })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, SourceError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

fn split_repository(repository: &str) -> Result<(&str, &str), SourceError> {
    let valid = |part: &str| {
        !part.is_empty()
            && part != "."
            && part != ".."
            && part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    };
    match repository.split_once('/') {
        Some((owner, name)) if valid(owner) && valid(name) => Ok((owner, name)),
        _ => Err(SourceError::InvalidRepository(repository.to_string())),
    }
}

/// Extract a gzipped tarball into `target`, dropping the single top-level
/// directory the archive wraps its contents in.
///
/// Extraction happens in a scratch directory under `cache_dir` that is
/// renamed into place, so a half-written `target` is never observed.
pub fn unpack_into<R: Read>(
    archive: R,
    cache_dir: &Path,
    target: &Path,
    label: &str,
) -> Result<(), SourceError> {
    std::fs::create_dir_all(cache_dir)?;
    let scratch = tempfile::Builder::new().prefix(".unpack-").tempdir_in(cache_dir)?;

    tar::Archive::new(GzDecoder::new(archive))
        .unpack(scratch.path())
        .map_err(|e| SourceError::MalformedArchive(format!("{label}: {e}")))?;

    let mut top_level = std::fs::read_dir(scratch.path())?.collect::<Result<Vec<_>, _>>()?;
    let root = match top_level.len() {
        1 if top_level[0].file_type()?.is_dir() => top_level.remove(0).path(),
        0 => return Err(SourceError::MalformedArchive(format!("{label}: empty archive"))),
        _ => scratch.path().to_path_buf(),
    };

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::rename(&root, target) {
        Ok(()) => Ok(()),
        // Another process finished the same commit first.
        Err(_) if target.exists() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;

    fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (path, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, contents.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_split_repository() {
        assert_eq!(split_repository("tessel-dev/site").unwrap(), ("tessel-dev", "site"));
        assert!(split_repository("site").is_err());
        assert!(split_repository("a/b/c").is_err());
        assert!(split_repository("../etc").is_err());
        assert!(split_repository("/site").is_err());
    }

    #[test]
    fn test_unpack_strips_top_level_directory() {
        let cache = tempfile::tempdir().unwrap();
        let target = cache.path().join("owner_site").join("abc123");
        let archive = tarball(&[
            ("owner-site-abc123/index.html", "<h1>hi</h1>"),
            ("owner-site-abc123/sitemap.txt", "index.html\n"),
        ]);

        unpack_into(&archive[..], cache.path(), &target, "owner/site").unwrap();

        assert_eq!(
            std::fs::read_to_string(target.join("index.html")).unwrap(),
            "<h1>hi</h1>"
        );
        assert!(target.join("sitemap.txt").exists());
        let leftovers: Vec<_> = std::fs::read_dir(cache.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".unpack-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_garbage_is_malformed() {
        let cache = tempfile::tempdir().unwrap();
        let err = unpack_into(&b"not a tarball"[..], cache.path(), &cache.path().join("x"), "o/n")
            .unwrap_err();
        assert!(matches!(err, SourceError::MalformedArchive(_)));
    }

    #[tokio::test]
    async fn test_invalid_repository_fails_before_any_request() {
        let cache = tempfile::tempdir().unwrap();
        let source = RemoteSource::new(cache.path()).with_api_base("http://127.0.0.1:9");
        let err = source.acquire("nope", "main").await.unwrap_err();
        assert!(matches!(err, SourceError::InvalidRepository(_)));
    }
}
