//! Command-line interface definition.
//!
//! - `tessel serve` - on-demand build and render server
//! - `tessel build` - one build, copied out or printed
//! - `tessel render` - one page rendered to stdout
//! - `tessel fetch` - download a remote source tree
//! - `tessel resolve` - run the on-demand module resolver over local files

mod commands;

use clap::Parser;
use std::path::PathBuf;

pub use commands::{BuildArgs, Command, FetchArgs, RenderArgs, ResolveArgs, ServeArgs};

/// tessel - build, render and serve HTML sites on demand
#[derive(Parser, Debug)]
#[command(
    name = "tessel",
    version,
    about = "Build, render and serve HTML sites on demand",
    long_about = "tessel serves a directory of HTML pages. Custom tags (bundle-script,\n\
                  package links, markdown and include blocks, server-side scripts) are\n\
                  turned into production output, bundled per target browser and cached."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file (default: ./tessel.config.json when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}
