//! Logging setup for the tessel CLI.
//!
//! Library crates log through `tracing`; this module installs the
//! subscriber.
//!
//! - `--verbose`: debug for every tessel crate
//! - `--quiet`: errors only
//! - otherwise `RUST_LOG`, falling back to info

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const VERBOSE_FILTER: &str = "tessel=debug,tessel_core=debug,tessel_browser=debug,tessel_cli=debug";
const QUIET_FILTER: &str = "tessel=error,tessel_core=error,tessel_browser=error,tessel_cli=error";
const DEFAULT_FILTER: &str = "tessel=info,tessel_core=info,tessel_browser=info,tessel_cli=info";

/// Filter for the given verbosity flags. `verbose` wins over `quiet`.
pub fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Install the global tracing subscriber. Call once, before logging.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .with_writer(std::io::stderr)
        .compact();

    // A second call (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter_for(verbose, quiet))
        .with(fmt_layer)
        .try_init();
}
