use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Available tessel subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve a site, building and rendering pages on request
    ///
    /// The target browser of each build is taken from the request's
    /// User-Agent header. Builds are cached per target and invalidated
    /// when their sources change.
    Serve(ServeArgs),

    /// Run one build of a site
    Build(BuildArgs),

    /// Build a site and render one page to stdout
    Render(RenderArgs),

    /// Download a GitHub repository at the head of a branch
    Fetch(FetchArgs),

    /// Resolve an ES module and its imports on demand
    ///
    /// Fetches, transpiles and rewrites the module graph rooted at MODULE,
    /// then prints the artifact handle of every module.
    Resolve(ResolveArgs),
}

/// Arguments for the serve command
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Site directory holding the HTML pages
    #[arg(value_name = "ROOT")]
    pub root: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Target browser when the user agent is not recognized (e.g. chrome80)
    #[arg(long, value_name = "TARGET")]
    pub browser: Option<String>,

    /// Keep builds cached when their sources change
    #[arg(long)]
    pub no_watch: bool,

    /// Chrome executable used for server-side scripts
    #[arg(long, value_name = "PATH")]
    pub chrome_path: Option<PathBuf>,
}

/// Arguments for the build command
#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Site directory holding the HTML pages
    #[arg(value_name = "ROOT")]
    pub root: Option<PathBuf>,

    /// Target browser of the bundles (e.g. chrome80, safari13)
    #[arg(long, value_name = "TARGET")]
    pub browser: Option<String>,

    /// Copy the built site here instead of printing its location
    #[arg(short, long, value_name = "DIR")]
    pub out: Option<PathBuf>,
}

/// Arguments for the render command
#[derive(Args, Debug, Clone, Default)]
pub struct RenderArgs {
    /// Site directory holding the HTML pages
    #[arg(value_name = "ROOT")]
    pub root: Option<PathBuf>,

    /// Page to render, relative to the site root
    #[arg(value_name = "PAGE", default_value = "index.html")]
    pub page: String,

    /// Target browser of the bundles
    #[arg(long, value_name = "TARGET")]
    pub browser: Option<String>,

    /// Chrome executable used for server-side scripts
    #[arg(long, value_name = "PATH")]
    pub chrome_path: Option<PathBuf>,
}

/// Arguments for the fetch command
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Repository in owner/name form
    #[arg(value_name = "REPOSITORY")]
    pub repository: String,

    /// Branch whose head commit is downloaded
    #[arg(short, long, default_value = "main")]
    pub branch: String,

    /// Directory downloaded trees are kept in
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// Arguments for the resolve command
#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    /// Directory the module specifier is resolved against
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Module to resolve, relative to ROOT
    #[arg(value_name = "MODULE")]
    pub module: String,
}
