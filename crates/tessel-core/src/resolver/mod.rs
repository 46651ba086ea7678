//! On-demand module resolution.
//!
//! [`ModuleResolver::resolve`] turns a module specifier into an artifact
//! handle: the module is fetched, transpiled, its static imports are
//! resolved recursively and spliced in as artifact handles, and the
//! rewritten code is published to an [`ArtifactStore`].
//!
//! Every canonical URL is resolved at most once. Concurrent requests for a
//! module share one in-flight future, so a diamond import graph fetches
//! and transpiles its shared leaf a single time. A failed module is not
//! cached; the next request for it starts over.
//!
//! Importers waiting on children are tracked in a wait-for graph. A
//! request that would make a module wait on itself, directly or through
//! other modules, fails with [`ResolutionError::Cycle`] instead of
//! deadlocking.

pub mod element;
pub mod fetch;
pub mod transpile;

pub use element::{BundleScriptElement, ElementEvent, ElementState};
pub use fetch::{DefaultFetcher, ModuleFetcher};
pub use transpile::{ImportSite, OxcTranspiler, TranspiledModule, Transpiler};

use crate::error::ResolutionError;
use crate::import_map::ImportMap;
use futures::future::{BoxFuture, FutureExt, Shared, try_join_all};
use indexmap::{IndexMap, IndexSet};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// URL prefix of artifacts published by [`MemoryArtifactStore::default`].
pub const DEFAULT_ARTIFACT_PREFIX: &str = "/__tessel/modules/";

/// Opaque reference to a published module, usable as an import specifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactHandle(String);

impl ArtifactHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Destination for resolved module code.
pub trait ArtifactStore: Send + Sync {
    /// Publish `code` for the module at `url` and return its handle.
    fn publish(&self, url: &Url, code: String) -> ArtifactHandle;
}

/// In-memory [`ArtifactStore`] keyed by content-addressed handles.
pub struct MemoryArtifactStore {
    prefix: String,
    artifacts: RwLock<HashMap<ArtifactHandle, Arc<str>>>,
}

impl MemoryArtifactStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            artifacts: RwLock::new(HashMap::new()),
        }
    }

    /// Code published under `handle`.
    pub fn get(&self, handle: &str) -> Option<Arc<str>> {
        self.artifacts
            .read()
            .get(&ArtifactHandle::new(handle))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.read().is_empty()
    }
}

impl Default for MemoryArtifactStore {
    fn default() -> Self {
        Self::new(DEFAULT_ARTIFACT_PREFIX)
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn publish(&self, url: &Url, code: String) -> ArtifactHandle {
        let mut hasher = blake3::Hasher::new();
        hasher.update(url.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(code.as_bytes());
        let id = &hasher.finalize().to_hex()[..16];

        let handle = ArtifactHandle::new(format!("{}{id}.js", self.prefix));
        self.artifacts.write().insert(handle.clone(), Arc::from(code));
        handle
    }
}

/// Where a module is in its resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Unseen,
    Fetching,
    Transpiling,
    AwaitingChildren,
    Cached,
    Failed,
}

type SharedResolution = Shared<BoxFuture<'static, Result<ArtifactHandle, ResolutionError>>>;

enum ModuleState {
    Pending {
        phase: ResolutionState,
        future: SharedResolution,
    },
    Cached(ArtifactHandle),
    Failed(ResolutionError),
}

#[derive(Default)]
struct ResolverState {
    modules: HashMap<Url, ModuleState>,
    /// importer → in-flight children it is waiting on
    waits: HashMap<Url, HashSet<Url>>,
}

impl ResolverState {
    /// Whether `target` is reachable from `from` in the wait-for graph.
    fn reaches(&self, from: &Url, target: &Url) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![from];
        while let Some(url) = stack.pop() {
            if url == target {
                return true;
            }
            if !seen.insert(url) {
                continue;
            }
            if let Some(children) = self.waits.get(url) {
                stack.extend(children.iter());
            }
        }
        false
    }

    fn wait(&mut self, importer: Option<&Url>, child: &Url) {
        if let Some(importer) = importer {
            self.waits
                .entry(importer.clone())
                .or_default()
                .insert(child.clone());
        }
    }
}

struct Inner {
    fetcher: Arc<dyn ModuleFetcher>,
    transpiler: Arc<dyn Transpiler>,
    store: Arc<dyn ArtifactStore>,
    globals: Option<ImportMap>,
    state: Mutex<ResolverState>,
}

/// Resolves module graphs into published artifacts. Cloning is cheap and
/// clones share one module cache.
#[derive(Clone)]
pub struct ModuleResolver {
    inner: Arc<Inner>,
}

impl ModuleResolver {
    pub fn new(
        fetcher: Arc<dyn ModuleFetcher>,
        transpiler: Arc<dyn Transpiler>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                transpiler,
                store,
                globals: None,
                state: Mutex::new(ResolverState::default()),
            }),
        }
    }

    /// Resolver with the default fetcher and the oxc transpiler.
    pub fn with_store(store: Arc<dyn ArtifactStore>) -> Self {
        Self::new(
            Arc::new(DefaultFetcher::default()),
            Arc::new(OxcTranspiler::new()),
            store,
        )
    }

    /// Expose the packages of `import_map` as page globals; see
    /// [`ModuleResolver::bootstrap`].
    pub fn with_globals(self, import_map: ImportMap) -> Self {
        let inner = Arc::new(Inner {
            fetcher: Arc::clone(&self.inner.fetcher),
            transpiler: Arc::clone(&self.inner.transpiler),
            store: Arc::clone(&self.inner.store),
            globals: Some(import_map),
            state: Mutex::new(ResolverState::default()),
        });
        Self { inner }
    }

    /// Script that registers the configured package globals, if any.
    pub fn bootstrap(&self) -> Option<String> {
        self.inner
            .globals
            .as_ref()
            .filter(|map| !map.is_empty())
            .map(ImportMap::global_bootstrap)
    }

    /// Resolve `specifier` relative to `base` into an artifact handle.
    ///
    /// # Errors
    ///
    /// The first error of the module or of any module it imports.
    pub async fn resolve(
        &self,
        specifier: &str,
        base: &Url,
    ) -> Result<ArtifactHandle, ResolutionError> {
        let url = canonicalize(specifier, base)?;
        Inner::request(&self.inner, url, None)?.await
    }

    /// Current state of the module at canonical `url`.
    pub fn state(&self, url: &Url) -> ResolutionState {
        match self.inner.state.lock().modules.get(url) {
            None => ResolutionState::Unseen,
            Some(ModuleState::Pending { phase, .. }) => *phase,
            Some(ModuleState::Cached(_)) => ResolutionState::Cached,
            Some(ModuleState::Failed(_)) => ResolutionState::Failed,
        }
    }

    /// Every cached module with its handle, sorted by URL.
    pub fn cached(&self) -> Vec<(Url, ArtifactHandle)> {
        let state = self.inner.state.lock();
        let mut cached: Vec<(Url, ArtifactHandle)> = state
            .modules
            .iter()
            .filter_map(|(url, module)| match module {
                ModuleState::Cached(handle) => Some((url.clone(), handle.clone())),
                _ => None,
            })
            .collect();
        cached.sort();
        cached
    }

    /// The error a module last failed with.
    pub fn failure(&self, url: &Url) -> Option<ResolutionError> {
        match self.inner.state.lock().modules.get(url) {
            Some(ModuleState::Failed(err)) => Some(err.clone()),
            _ => None,
        }
    }
}

enum Existing {
    Cached(ArtifactHandle),
    Pending(SharedResolution),
    Absent,
}

impl Inner {
    /// Future resolving `url`, joining an in-flight resolution if there is
    /// one. `importer` is the module that will await the future.
    fn request(
        self: &Arc<Self>,
        url: Url,
        importer: Option<&Url>,
    ) -> Result<SharedResolution, ResolutionError> {
        let mut state = self.state.lock();
        let existing = match state.modules.get(&url) {
            Some(ModuleState::Cached(handle)) => Existing::Cached(handle.clone()),
            Some(ModuleState::Pending { future, .. }) => Existing::Pending(future.clone()),
            Some(ModuleState::Failed(_)) | None => Existing::Absent,
        };

        match existing {
            Existing::Cached(handle) => Ok(futures::future::ready(Ok(handle)).boxed().shared()),
            Existing::Pending(future) => {
                if let Some(importer) = importer {
                    if state.reaches(&url, importer) {
                        warn!("Import cycle through {}", url);
                        return Err(ResolutionError::Cycle {
                            url: url.to_string(),
                        });
                    }
                }
                state.wait(importer, &url);
                Ok(future)
            }
            Existing::Absent => {
                debug!("{} -> Fetching", url);
                let future = Arc::clone(self).load(url.clone()).shared();
                state.modules.insert(
                    url.clone(),
                    ModuleState::Pending {
                        phase: ResolutionState::Fetching,
                        future: future.clone(),
                    },
                );
                state.wait(importer, &url);
                Ok(future)
            }
        }
    }

    fn load(self: Arc<Self>, url: Url) -> BoxFuture<'static, Result<ArtifactHandle, ResolutionError>> {
        async move {
            let result = self.resolve_module(&url).await;

            let mut state = self.state.lock();
            state.waits.remove(&url);
            match &result {
                Ok(handle) => {
                    info!("Resolved {} -> {}", url, handle);
                    state.modules.insert(url, ModuleState::Cached(handle.clone()));
                }
                Err(err) => {
                    debug!("{} -> Failed: {}", url, err);
                    state.modules.insert(url, ModuleState::Failed(err.clone()));
                }
            }
            result
        }
        .boxed()
    }

    async fn resolve_module(self: &Arc<Self>, url: &Url) -> Result<ArtifactHandle, ResolutionError> {
        let source = self.fetcher.fetch(url).await?;

        self.set_phase(url, ResolutionState::Transpiling);
        let module = self.transpiler.transpile(url, &source)?;

        let mut children: IndexMap<String, Url> = IndexMap::new();
        for site in &module.imports {
            children.insert(site.specifier.clone(), canonicalize(&site.specifier, url)?);
        }

        let handles: HashMap<Url, ArtifactHandle> = if children.is_empty() {
            HashMap::new()
        } else {
            self.set_phase(url, ResolutionState::AwaitingChildren);
            let unique: IndexSet<Url> = children.values().cloned().collect();
            let pending = unique
                .iter()
                .map(|child| self.request(child.clone(), Some(url)))
                .collect::<Result<Vec<_>, _>>()?;
            let resolved = try_join_all(pending).await?;
            unique.into_iter().zip(resolved).collect()
        };

        let replacements: HashMap<String, String> = children
            .iter()
            .filter_map(|(specifier, child)| {
                handles
                    .get(child)
                    .map(|handle| (specifier.clone(), handle.to_string()))
            })
            .collect();
        let code = module.rewrite_imports(&replacements);

        Ok(self.store.publish(url, code))
    }

    fn set_phase(&self, url: &Url, next: ResolutionState) {
        if let Some(ModuleState::Pending { phase, .. }) = self.state.lock().modules.get_mut(url) {
            debug!("{} -> {:?}", url, next);
            *phase = next;
        }
    }
}

/// Resolve `specifier` against `base` and drop the fragment.
pub fn canonicalize(specifier: &str, base: &Url) -> Result<Url, ResolutionError> {
    let mut url = base
        .join(specifier)
        .map_err(|e| ResolutionError::InvalidSpecifier {
            specifier: specifier.to_string(),
            base: base.to_string(),
            reason: e.to_string(),
        })?;
    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.test/app/main.js").unwrap()
    }

    #[test]
    fn test_canonicalize() {
        assert_eq!(
            canonicalize("./util.js#frag", &base()).unwrap().as_str(),
            "https://example.test/app/util.js"
        );
        assert_eq!(
            canonicalize("../lib/x.js", &base()).unwrap().as_str(),
            "https://example.test/lib/x.js"
        );
        assert_eq!(
            canonicalize("https://cdn.test/y.js", &base()).unwrap().as_str(),
            "https://cdn.test/y.js"
        );
    }

    #[test]
    fn test_invalid_specifier() {
        let err = canonicalize("http://[::1", &base()).unwrap_err();
        assert!(matches!(err, ResolutionError::InvalidSpecifier { .. }));
    }

    #[test]
    fn test_memory_store_is_content_addressed() {
        let store = MemoryArtifactStore::default();
        let a = store.publish(&base(), "export default 1;".into());
        let again = store.publish(&base(), "export default 1;".into());
        let b = store.publish(&base(), "export default 2;".into());
        assert_eq!(a, again);
        assert_ne!(a, b);
        assert!(a.as_str().starts_with(DEFAULT_ARTIFACT_PREFIX));
        assert!(a.as_str().ends_with(".js"));
        assert_eq!(store.get(a.as_str()).as_deref(), Some("export default 1;"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_wait_graph_reachability() {
        let a = Url::parse("https://x.test/a.js").unwrap();
        let b = Url::parse("https://x.test/b.js").unwrap();
        let c = Url::parse("https://x.test/c.js").unwrap();
        let mut state = ResolverState::default();
        state.wait(Some(&a), &b);
        state.wait(Some(&b), &c);
        assert!(state.reaches(&a, &c));
        assert!(!state.reaches(&c, &a));
        assert!(state.reaches(&a, &a));
    }
}
