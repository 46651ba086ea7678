//! Build orchestration.
//!
//! [`Builder::ensure_built`] turns a [`BuildConfiguration`] into a staged,
//! rewritten and bundled copy of the site:
//!
//! 1. Return the cached result if there is one.
//! 2. Otherwise take the process-wide build slot, re-check the cache, and
//!    build:
//!    - stage a temporary copy of the source root (`<tmp>/.dist`);
//!    - read `sitemap.txt` (or default to `index.html`) and rewrite every
//!      listed page concurrently, writing each back in place;
//!    - write inline payloads, then the workspace template files;
//!    - install the union of dependencies, then bundle the union of
//!      entries for the target browser.
//! 3. Register the result and, for watched configurations, invalidate it
//!    as soon as one of its pages or bundle sources changes.
//!
//! The build runs on its own task so a caller that gives up does not
//! abort a build other callers are waiting on.

use crate::bundler::{BundleJob, Bundler};
use crate::cache::{BuildCache, BuildResult};
use crate::config::BuildConfiguration;
use crate::error::{BuildError, ConfigError, Result};
use crate::rewrite::{InlineScriptPayload, ResourceLoader, RewriteOutput, rewrite_page};
use crate::site;
use crate::watch::SourceWatcher;
use futures::future::try_join_all;
use indexmap::IndexSet;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Name of the staged site inside a build workspace.
pub const STAGED_SITE_DIR: &str = ".dist";

/// Entries never copied into the staged site.
const SKIPPED_DIRS: &[&str] = &[".git", "node_modules"];

const PACKAGE_JSON: &str = "{\n  \"private\": true\n}\n";

/// Builds sites on demand, sharing one [`BuildCache`].
#[derive(Clone)]
pub struct Builder {
    cache: Arc<BuildCache>,
    bundler: Arc<dyn Bundler>,
    loader: Arc<dyn ResourceLoader>,
}

struct BuildOutcome {
    result: BuildResult,
    sources: Vec<String>,
}

impl Builder {
    pub fn new(cache: Arc<BuildCache>, bundler: Arc<dyn Bundler>, loader: Arc<dyn ResourceLoader>) -> Self {
        Self {
            cache,
            bundler,
            loader,
        }
    }

    pub fn cache(&self) -> &Arc<BuildCache> {
        &self.cache
    }

    /// Make sure `config` is built and return its output directory.
    ///
    /// # Errors
    ///
    /// Rewrite failures surface as [`Error::Config`](crate::Error::Config),
    /// staging and bundler failures as
    /// [`Error::Build`](crate::Error::Build). Nothing is cached on failure.
    pub async fn ensure_built(&self, config: &BuildConfiguration) -> Result<BuildResult> {
        if let Some(result) = self.cache.get(config) {
            debug!("Build cache hit for {}", config.cache_key().digest());
            return Ok(result);
        }

        let builder = self.clone();
        let config = config.clone();
        let task = tokio::spawn(async move { builder.build_exclusive(&config).await });

        task.await
            .map_err(|e| BuildError::Aborted(e.to_string()))?
    }

    async fn build_exclusive(&self, config: &BuildConfiguration) -> Result<BuildResult> {
        let _slot = self.cache.begin_build().await;
        if let Some(result) = self.cache.get(config) {
            debug!("Build for {} finished while waiting", config.cache_key().digest());
            return Ok(result);
        }
        let outcome = self.build(config).await?;
        self.register(config, outcome).await
    }

    async fn build(&self, config: &BuildConfiguration) -> Result<BuildOutcome> {
        let source_root = config.source_root();
        if !tokio::fs::metadata(source_root).await.is_ok_and(|m| m.is_dir()) {
            return Err(ConfigError::SourceRootNotFound(source_root.to_path_buf()).into());
        }

        let started = Instant::now();
        info!(
            "Building {} for {}",
            source_root.display(),
            config.target_browser()
        );

        let workspace_dir = tempfile::Builder::new().prefix("tessel-").tempdir()?;
        let workspace = workspace_dir.path().to_path_buf();
        let site_dir = workspace.join(STAGED_SITE_DIR);
        stage(source_root, &site_dir).await?;

        let pages = site::read_manifest(&site_dir).await?;
        let rewrites = try_join_all(pages.iter().map(|page| self.rewrite_staged(&site_dir, page))).await?;

        let mut entries = BTreeSet::new();
        let mut dependencies = IndexSet::new();
        let mut payloads = IndexSet::new();
        for rewrite in rewrites {
            entries.extend(rewrite.entries);
            dependencies.extend(rewrite.dependencies);
            payloads.extend(rewrite.payloads);
        }

        try_join_all(payloads.iter().map(|payload| write_payload(&site_dir, payload))).await?;

        let dependencies: Vec<String> = dependencies.into_iter().collect();
        let job = BundleJob {
            workspace_dir: workspace.clone(),
            site_dir: site_dir.clone(),
            entries: entries.iter().cloned().collect(),
            target_browser: config.target_browser().to_string(),
        };
        write_template(&job, self.bundler.describe(&job, &dependencies)).await?;

        self.bundler.install(&workspace, &dependencies).await?;
        self.bundler.bundle(&job).await?;

        info!(
            "Built {} pages, {} entries, {} packages in {}ms",
            pages.len(),
            entries.len(),
            dependencies.len(),
            started.elapsed().as_millis()
        );

        // Output outlives the build; failures above drop the workspace.
        let _ = workspace_dir.keep();

        let sources = pages
            .into_iter()
            .chain(
                entries
                    .iter()
                    .filter(|entry| !entry.is_synthesized())
                    .map(|entry| entry.path().to_string()),
            )
            .collect();

        Ok(BuildOutcome {
            result: BuildResult { output_dir: site_dir },
            sources,
        })
    }

    async fn rewrite_staged(&self, site_dir: &Path, page: &str) -> Result<RewriteOutput> {
        let path = site_dir.join(page);
        let html = match tokio::fs::read_to_string(&path).await {
            Ok(html) => html,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::MissingPage(PathBuf::from(page)).into());
            }
            Err(e) => return Err(e.into()),
        };

        let output = rewrite_page(&html, page, site_dir, self.loader.as_ref()).await?;
        tokio::fs::write(&path, &output.html).await?;
        debug!("Rewrote {}", page);
        Ok(output)
    }

    async fn register(&self, config: &BuildConfiguration, outcome: BuildOutcome) -> Result<BuildResult> {
        let generation = self.cache.put(config, outcome.result.clone());
        if config.watch() {
            self.watch(config, generation, &outcome.sources).await;
        }
        Ok(outcome.result)
    }

    async fn watch(&self, config: &BuildConfiguration, generation: u64, sources: &[String]) {
        let root = tokio::fs::canonicalize(config.source_root())
            .await
            .unwrap_or_else(|_| config.source_root().to_path_buf());
        let files: Vec<PathBuf> = sources
            .iter()
            .map(|source| root.join(source))
            .filter(|path| path.is_file())
            .collect();

        let (watcher, mut changes) = match SourceWatcher::watch(files) {
            Ok(watch) => watch,
            Err(e) => {
                warn!("Not watching {}: {}", config.source_root().display(), e);
                return;
            }
        };

        let cache = Arc::downgrade(&self.cache);
        let key = config.cache_key();
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let _watcher = watcher;
            let Some(change) = changes.recv().await else {
                return;
            };
            if let Some(cache) = cache.upgrade() {
                if cache.invalidate_generation(&task_key, generation) {
                    info!(
                        "{} changed, invalidating build {}",
                        change.path().display(),
                        task_key.digest()
                    );
                }
            }
        });
        self.cache.attach_watch(&key, generation, task.abort_handle());
    }
}

/// Copy `source` into `target`, skipping VCS and dependency directories.
async fn stage(source: &Path, target: &Path) -> Result<(), BuildError> {
    let source = source.to_path_buf();
    let target = target.to_path_buf();
    tokio::task::spawn_blocking(move || copy_tree(&source, &target))
        .await
        .map_err(|e| BuildError::Aborted(e.to_string()))?
}

fn copy_tree(source: &Path, target: &Path) -> Result<(), BuildError> {
    let staging = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| BuildError::Staging { path, source }
    };

    let walker = walkdir::WalkDir::new(source).into_iter().filter_entry(|entry| {
        entry.depth() == 0
            || !SKIPPED_DIRS
                .iter()
                .any(|skip| entry.file_name() == std::ffi::OsStr::new(skip))
    });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| source.to_path_buf());
            BuildError::Staging {
                path,
                source: e.into(),
            }
        })?;
        let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
        let destination = target.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&destination).map_err(staging(&destination))?;
        } else {
            std::fs::copy(entry.path(), &destination).map_err(staging(entry.path()))?;
        }
    }
    Ok(())
}

async fn write_payload(site_dir: &Path, payload: &InlineScriptPayload) -> Result<(), BuildError> {
    let path = site_dir.join(&payload.synthetic_path);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, &payload.source).await?;
    debug!("Wrote inline payload {}", payload.synthetic_path);
    Ok(())
}

/// Write `package.json` (unless the site brought one) and the debugging
/// build script into the workspace.
async fn write_template(job: &BundleJob, script: Option<String>) -> Result<(), BuildError> {
    let package_json = job.workspace_dir.join("package.json");
    let site_package = job.site_dir.join("package.json");
    if tokio::fs::try_exists(&site_package).await.unwrap_or(false) {
        tokio::fs::copy(&site_package, &package_json).await?;
    } else {
        tokio::fs::write(&package_json, PACKAGE_JSON).await?;
    }

    if let Some(script) = script {
        tokio::fs::write(job.workspace_dir.join("build.sh"), script).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_tree_skips_dependency_dirs() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("js")).unwrap();
        std::fs::create_dir_all(src.path().join("node_modules/x")).unwrap();
        std::fs::write(src.path().join("index.html"), "<p>").unwrap();
        std::fs::write(src.path().join("js/app.js"), "1").unwrap();
        std::fs::write(src.path().join("node_modules/x/index.js"), "1").unwrap();

        let target = dst.path().join(".dist");
        copy_tree(src.path(), &target).unwrap();

        assert!(target.join("index.html").is_file());
        assert!(target.join("js/app.js").is_file());
        assert!(!target.join("node_modules").exists());
    }
}
