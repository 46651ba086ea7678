//! Build cache: one live result per configuration.
//!
//! The cache is an explicit object shared by everything that builds. It
//! holds three things:
//!
//! - the completed results, keyed by [`CacheKey`];
//! - the process-wide build slot ([`BuildCache::begin_build`]): at most
//!   one build, and therefore one bundler process, runs at a time;
//! - per-entry watch tasks, aborted whenever their entry is superseded or
//!   invalidated.
//!
//! Eviction only forgets the entry. The output directory stays on disk so
//! requests that already hold it can finish.

use crate::config::{BuildConfiguration, CacheKey};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::AbortHandle;
use tracing::debug;

/// A completed build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    /// Staged site with rewritten pages and bundles
    pub output_dir: PathBuf,
}

struct CachedBuild {
    result: BuildResult,
    generation: u64,
    watch_task: Option<AbortHandle>,
}

impl Drop for CachedBuild {
    fn drop(&mut self) {
        if let Some(task) = self.watch_task.take() {
            task.abort();
        }
    }
}

/// Proof of holding the process-wide build slot. Released on drop.
pub struct BuildSlot {
    _guard: OwnedMutexGuard<()>,
}

/// Shared cache of completed builds.
pub struct BuildCache {
    entries: RwLock<HashMap<CacheKey, CachedBuild>>,
    slot: Arc<Mutex<()>>,
    generations: AtomicU64,
}

impl Default for BuildCache {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            slot: Arc::new(Mutex::new(())),
            generations: AtomicU64::new(0),
        }
    }

    /// Cached result for `config`, if any.
    pub fn get(&self, config: &BuildConfiguration) -> Option<BuildResult> {
        self.entries
            .read()
            .get(&config.cache_key())
            .map(|entry| entry.result.clone())
    }

    /// Store `result` for `config`, replacing (and unwatching) any previous
    /// result.
    ///
    /// # Returns
    ///
    /// The generation of the new entry, used to attach a watcher and to
    /// invalidate exactly this entry later.
    pub fn put(&self, config: &BuildConfiguration, result: BuildResult) -> u64 {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let key = config.cache_key();
        debug!("Caching build {} (generation {})", key.digest(), generation);
        self.entries.write().insert(
            key,
            CachedBuild {
                result,
                generation,
                watch_task: None,
            },
        );
        generation
    }

    /// Attach the watch task that invalidates entry `generation` of `key`.
    ///
    /// If that entry is already gone the task is aborted immediately.
    pub fn attach_watch(&self, key: &CacheKey, generation: u64, task: AbortHandle) {
        let mut entries = self.entries.write();
        match entries.get_mut(key) {
            Some(entry) if entry.generation == generation => {
                if let Some(previous) = entry.watch_task.replace(task) {
                    previous.abort();
                }
            }
            _ => task.abort(),
        }
    }

    /// Evict the entry for `config`. Returns whether an entry was removed.
    pub fn invalidate(&self, config: &BuildConfiguration) -> bool {
        self.entries.write().remove(&config.cache_key()).is_some()
    }

    /// Evict `key` only if it still holds entry `generation`, so a stale
    /// watcher cannot evict a newer build of the same configuration.
    pub fn invalidate_generation(&self, key: &CacheKey, generation: u64) -> bool {
        let removed = {
            let mut entries = self.entries.write();
            match entries.get(key) {
                Some(entry) if entry.generation == generation => entries.remove(key),
                _ => None,
            }
        };
        removed.is_some()
    }

    /// Wait for and take the process-wide build slot.
    ///
    /// Holders must re-check [`get`](Self::get) after acquiring it: the
    /// build they waited on may have produced what they need.
    pub async fn begin_build(&self) -> BuildSlot {
        BuildSlot {
            _guard: self.slot.clone().lock_owned().await,
        }
    }

    /// Whether a build currently holds the slot.
    pub fn is_building(&self) -> bool {
        self.slot.try_lock().is_err()
    }

    /// Number of cached configurations.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(browser: &str) -> BuildConfiguration {
        BuildConfiguration::new("/site", browser, true)
    }

    fn result(dir: &str) -> BuildResult {
        BuildResult {
            output_dir: PathBuf::from(dir),
        }
    }

    #[test]
    fn test_get_put_invalidate() {
        let cache = BuildCache::new();
        let a = config("chrome80");
        assert!(cache.get(&a).is_none());

        cache.put(&a, result("/tmp/a"));
        assert_eq!(cache.get(&a), Some(result("/tmp/a")));

        assert!(cache.invalidate(&a));
        assert!(cache.get(&a).is_none());
        assert!(!cache.invalidate(&a));
    }

    #[test]
    fn test_invalidating_one_configuration_keeps_others() {
        let cache = BuildCache::new();
        let a = config("chrome80");
        let b = config("firefox100");
        cache.put(&a, result("/tmp/a"));
        cache.put(&b, result("/tmp/b"));

        cache.invalidate(&a);
        assert!(cache.get(&a).is_none());
        assert_eq!(cache.get(&b), Some(result("/tmp/b")));
    }

    #[test]
    fn test_stale_generation_does_not_evict() {
        let cache = BuildCache::new();
        let a = config("chrome80");
        let old = cache.put(&a, result("/tmp/old"));
        let new = cache.put(&a, result("/tmp/new"));
        assert_ne!(old, new);

        assert!(!cache.invalidate_generation(&a.cache_key(), old));
        assert_eq!(cache.get(&a), Some(result("/tmp/new")));
        assert!(cache.invalidate_generation(&a.cache_key(), new));
    }

    #[tokio::test]
    async fn test_superseded_entry_aborts_its_watch_task() {
        let cache = BuildCache::new();
        let a = config("chrome80");
        let generation = cache.put(&a, result("/tmp/a"));

        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        cache.attach_watch(&a.cache_key(), generation, task.abort_handle());

        cache.put(&a, result("/tmp/a2"));
        let joined = task.await;
        assert!(joined.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_build_slot_is_exclusive() {
        let cache = BuildCache::new();
        assert!(!cache.is_building());

        let slot = cache.begin_build().await;
        assert!(cache.is_building());

        drop(slot);
        assert!(!cache.is_building());
    }
}
