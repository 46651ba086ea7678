//! Command implementations. Each module exposes an `execute` function
//! taking the parsed arguments.

pub mod build;
pub mod fetch;
pub mod render;
pub mod resolve;
pub mod serve;

use crate::config::TesselConfig;
use std::sync::Arc;
use tessel_core::{BuildCache, Builder, CommandBundler, DefaultResourceLoader};

pub use build::execute as build_execute;
pub use fetch::execute as fetch_execute;
pub use render::execute as render_execute;
pub use resolve::execute as resolve_execute;
pub use serve::execute as serve_execute;

/// Builder driving npm and esbuild as configured.
pub(crate) fn builder(config: &TesselConfig) -> Arc<Builder> {
    Arc::new(Builder::new(
        Arc::new(BuildCache::new()),
        Arc::new(CommandBundler::new(config.bundler_options())),
        Arc::new(DefaultResourceLoader::default()),
    ))
}
