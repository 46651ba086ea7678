//! File watching for build invalidation.
//!
//! A [`SourceWatcher`] watches an explicit set of files (the bundle
//! sources and pages of one build). Each file's parent directory is
//! watched non-recursively and events are filtered down to the set, so
//! editors that save by rename-and-replace still trigger a change.

use crate::error::BuildError;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// File change event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    /// File was modified
    Modified(PathBuf),
    /// File was created
    Created(PathBuf),
    /// File was removed
    Removed(PathBuf),
}

impl FileChange {
    /// Get the path affected by this change.
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }
}

/// Watches a fixed set of files until dropped.
pub struct SourceWatcher {
    _watcher: RecommendedWatcher,
    files: HashSet<PathBuf>,
}

impl SourceWatcher {
    /// Start watching `files`.
    ///
    /// # Returns
    ///
    /// Tuple of (SourceWatcher, receiver for change events). Events stop
    /// when the watcher is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Watch`] if the platform watcher cannot be
    /// created. Directories that cannot be watched are skipped with a
    /// warning.
    pub fn watch<I>(files: I) -> Result<(Self, mpsc::Receiver<FileChange>), BuildError>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let files: HashSet<PathBuf> = files.into_iter().collect();
        let (tx, rx) = mpsc::channel(64);

        let filter = files.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            for path in &event.paths {
                if !filter.contains(path) {
                    continue;
                }
                let change = match event.kind {
                    EventKind::Create(_) => FileChange::Created(path.clone()),
                    EventKind::Modify(_) => FileChange::Modified(path.clone()),
                    EventKind::Remove(_) => FileChange::Removed(path.clone()),
                    _ => continue,
                };
                // Receiver gone means the build was already invalidated.
                let _ = tx.try_send(change);
            }
        })?;

        let directories: BTreeSet<&Path> = files.iter().filter_map(|f| f.parent()).collect();
        for dir in directories {
            match watcher.watch(dir, RecursiveMode::NonRecursive) {
                Ok(()) => debug!("Watching {}", dir.display()),
                Err(e) => warn!("Cannot watch {}: {}", dir.display(), e),
            }
        }

        Ok((
            Self {
                _watcher: watcher,
                files,
            },
            rx,
        ))
    }

    /// Files this watcher reports on.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_file_change_path() {
        let change = FileChange::Removed(PathBuf::from("/site/a.js"));
        assert_eq!(change.path(), Path::new("/site/a.js"));
    }

    #[tokio::test]
    async fn test_reports_changes_to_watched_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let watched = root.join("a.js");
        let other = root.join("b.js");
        std::fs::write(&watched, "1").unwrap();
        std::fs::write(&other, "1").unwrap();

        let (watcher, mut rx) = SourceWatcher::watch([watched.clone()]).unwrap();
        assert_eq!(watcher.files().count(), 1);

        std::fs::write(&other, "2").unwrap();
        std::fs::write(&watched, "2").unwrap();

        let change = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("change within timeout")
            .expect("channel open");
        assert_eq!(change.path(), watched.as_path());
    }
}
