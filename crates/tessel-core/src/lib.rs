//! # tessel-core
//!
//! Build and render pipeline behind the tessel dev server.
//!
//! A site is a directory of HTML pages listed in `sitemap.txt`. Pages use
//! a small tag vocabulary that this crate turns into plain HTML:
//!
//! - `<bundle-script>` entries are bundled per target browser
//! - `<link rel="importmap">` and `<link rel="package">` declare npm
//!   dependencies installed before bundling
//! - `<trans-md>` and `<trans-inc>` expand markdown and includes at
//!   request time
//! - `<script side="server">` runs in a headless browser before the page
//!   is served
//! - `dev-only` elements are stripped from served pages
//!
//! ## Architecture
//!
//! - **[`Builder`]**: stages a site, rewrites its pages, installs
//!   dependencies and bundles entries, one build at a time
//! - **[`BuildCache`]**: one live [`BuildResult`] per
//!   [`BuildConfiguration`], evicted when a watched source changes
//! - **[`PageExecutor`]**: request-time expansion of a built page
//! - **[`ModuleResolver`]**: on-demand transpilation of module graphs
//! - **[`RemoteSource`]**: repository snapshots as local source roots
//!
//! Process spawning, browsers and HTTP live behind traits ([`Bundler`],
//! [`ScriptRuntime`], [`ResourceLoader`], [`ModuleFetcher`]) so every
//! stage can be tested with fakes.

pub mod build;
pub mod bundler;
pub mod cache;
pub mod config;
pub mod dom;
pub mod error;
pub mod execute;
pub mod import_map;
pub mod resolver;
pub mod rewrite;
pub mod site;
pub mod source;
pub mod watch;

pub use build::Builder;
pub use bundler::{BundleJob, Bundler, BundlerOptions, CommandBundler};
pub use cache::{BuildCache, BuildResult};
pub use config::{BuildConfiguration, CacheKey, DEFAULT_TARGET_BROWSER, target_browser_from_user_agent};
pub use error::{BuildError, ConfigError, Error, RenderError, ResolutionError, Result, SourceError};
pub use execute::{ExecutionRequest, PageExecutor, ScriptRuntime, ScriptTarget};
pub use import_map::{ImportMap, PackageSpec};
pub use resolver::{
    ArtifactHandle, ArtifactStore, BundleScriptElement, DefaultFetcher, ElementEvent, ElementState,
    MemoryArtifactStore, ModuleFetcher, ModuleResolver, OxcTranspiler, ResolutionState, Transpiler,
};
pub use rewrite::{BundleEntry, DefaultResourceLoader, ResourceLoader, RewriteOutput, rewrite_page};
pub use source::RemoteSource;
pub use watch::{FileChange, SourceWatcher};
