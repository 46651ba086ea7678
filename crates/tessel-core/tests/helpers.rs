//! Shared fakes for tessel-core integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tessel_core::error::BuildError;
use tessel_core::{
    BuildCache, BundleJob, Bundler, Builder, DefaultResourceLoader,
};

/// Bundler that records its calls and writes placeholder bundles.
#[derive(Default)]
pub struct RecordingBundler {
    pub delay: Duration,
    pub fail: AtomicBool,
    runs: AtomicUsize,
    active: AtomicUsize,
    overlapped: AtomicBool,
    installs: Mutex<Vec<Vec<String>>>,
    jobs: Mutex<Vec<BundleJob>>,
}

impl RecordingBundler {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }

    pub fn installs(&self) -> Vec<Vec<String>> {
        self.installs.lock().clone()
    }

    pub fn jobs(&self) -> Vec<BundleJob> {
        self.jobs.lock().clone()
    }
}

#[async_trait]
impl Bundler for RecordingBundler {
    async fn install(&self, _workspace_dir: &Path, dependencies: &[String]) -> Result<(), BuildError> {
        self.installs.lock().push(dependencies.to_vec());
        Ok(())
    }

    async fn bundle(&self, job: &BundleJob) -> Result<(), BuildError> {
        if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.jobs.lock().push(job.clone());

        tokio::time::sleep(self.delay).await;
        let result = if self.fail.load(Ordering::SeqCst) {
            Err(BuildError::CommandFailed {
                command: "esbuild".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "boom".to_string(),
            })
        } else {
            for entry in &job.entries {
                tokio::fs::write(job.site_dir.join(entry.bundle_path()), "/* bundle */").await?;
            }
            Ok(())
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub fn builder(bundler: Arc<RecordingBundler>) -> Builder {
    Builder::new(
        Arc::new(BuildCache::new()),
        bundler,
        Arc::new(DefaultResourceLoader::default()),
    )
}

/// Write `files` (path, contents) below `root`.
pub fn write_site(root: &Path, files: &[(&str, &str)]) {
    for (path, contents) in files {
        let path = root.join(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }
}

/// A one-page site with a single bundle entry.
pub fn simple_site(root: &Path) {
    write_site(
        root,
        &[
            (
                "index.html",
                r#"<html><head></head><body><bundle-script src="app.js"></bundle-script></body></html>"#,
            ),
            ("app.js", "console.log('app');"),
        ],
    );
}
