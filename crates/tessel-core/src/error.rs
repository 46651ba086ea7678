//! Error types for the tessel pipeline.
//!
//! Every stage reports its own error enum so callers can match on the
//! failure domain. [`Error`] is the umbrella type returned by the
//! orchestrating entry points and converts from each domain error via
//! `#[from]`.
//!
//! No stage ever returns partial output alongside an error: a failed
//! rewrite, build or render yields only the error.

use std::path::PathBuf;
use thiserror::Error;

/// Umbrella error for the whole pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// The site, its manifest or one of its declarations is malformed
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Staging or bundling failed
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Page execution failed
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// On-demand module resolution failed
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Remote source acquisition failed
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// I/O errors from file system operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors in site configuration and authoring-time declarations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Source root does not exist or is not a directory
    #[error("Source root not found: {}\n\nHint: Pass the directory that holds your HTML pages", .0.display())]
    SourceRootNotFound(PathBuf),

    /// An import map document is not valid JSON of the expected shape
    #[error("Invalid import map '{href}': {source}\n\nHint: Import maps are JSON objects of the form {{\"name\": {{\"global\", \"version\", \"url\"}}}}")]
    InvalidImportMap {
        /// Location the import map was loaded from
        href: String,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },

    /// An import map document could not be loaded
    #[error("Failed to load import map '{href}': {reason}")]
    ImportMapUnavailable {
        /// Location the import map was loaded from
        href: String,
        /// Why loading failed
        reason: String,
    },

    /// A `<link rel="package">` tag is missing a required attribute
    #[error("Invalid package declaration: missing '{attribute}'\n\nHint: Package links need name, version, global and href attributes")]
    InvalidPackageDeclaration {
        /// Name of the missing attribute
        attribute: &'static str,
    },

    /// A `sitemap.txt` line points outside the site
    #[error("Invalid sitemap entry '{entry}': {reason}")]
    InvalidManifest {
        /// Offending manifest line
        entry: String,
        /// Why it was rejected
        reason: String,
    },

    /// A page listed in the manifest does not exist
    #[error("Page not found: {}\n\nHint: Check the paths listed in sitemap.txt", .0.display())]
    MissingPage(PathBuf),

    /// A `<bundle-script src>` that cannot be bundled
    #[error("Invalid bundle entry '{src}' in {page}\n\nHint: bundle-script sources must be relative paths inside the site")]
    InvalidEntry {
        /// Page the tag appeared in
        page: String,
        /// Offending `src` value
        src: String,
    },
}

/// Errors while staging a site or running the external bundler.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Copying the source root into the staging directory failed
    #[error("Failed to stage {}: {source}", .path.display())]
    Staging {
        /// File or directory being staged
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The bundler program could not be started
    #[error("Failed to start '{program}': {source}\n\nHint: Make sure {program} is installed and on your PATH")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A bundler step exited with a non-zero status
    #[error("'{command}' exited with {status}:\n{stderr}")]
    CommandFailed {
        /// Command line that failed
        command: String,
        /// Exit status description
        status: String,
        /// Captured standard error
        stderr: String,
    },

    /// The background build task stopped before finishing
    #[error("Build task aborted: {0}")]
    Aborted(String),

    /// Registering file watchers failed
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Rewriting a page failed
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O errors while writing build artifacts
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while executing a rewritten page.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A `<trans-inc>` or `<trans-md>` source file is missing
    #[error("Included file not found: {}", .0.display())]
    MissingInclude(PathBuf),

    /// A server-side script threw or failed to load
    #[error("Server script failed: {0}")]
    ServerScript(String),

    /// The page contains server scripts but no runtime is configured
    #[error("Page has server-side scripts but no script runtime is configured\n\nHint: Enable the headless runtime to execute side=\"server\" scripts")]
    NoRuntime,

    /// The script runtime itself failed (launch, navigation, timeout)
    #[error("Script runtime error: {0}")]
    Runtime(String),

    /// I/O errors while reading includes
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the on-demand module resolver.
///
/// `Clone` because one failure is delivered to every importer waiting on
/// the same in-flight module.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    /// Specifier cannot be resolved against its base URL
    #[error("Cannot resolve '{specifier}' from {base}: {reason}")]
    InvalidSpecifier {
        /// Import specifier as written
        specifier: String,
        /// URL of the importing module
        base: String,
        /// Parser message
        reason: String,
    },

    /// The module source could not be fetched
    #[error("Failed to fetch {url}: {reason}")]
    Fetch {
        /// Canonical module URL
        url: String,
        /// Why fetching failed
        reason: String,
    },

    /// The module source could not be transpiled
    #[error("Failed to transpile {url}: {message}")]
    Transpile {
        /// Canonical module URL
        url: String,
        /// Diagnostic text
        message: String,
    },

    /// Resolution would wait on itself
    #[error("Circular import involving {url}\n\nHint: On-demand modules cannot import each other in a cycle")]
    Cycle {
        /// Module that closes the cycle
        url: String,
    },
}

/// Errors while acquiring a remote source tree.
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP transport failure
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote answered with a non-success status
    #[error("{url} returned {status}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The branch lookup did not name a commit
    #[error("No commit found for {repository}@{branch}")]
    MissingCommit {
        /// `owner/name`
        repository: String,
        /// Requested branch
        branch: String,
    },

    /// Repository name is not of the form `owner/name`
    #[error("Invalid repository '{0}'\n\nHint: Use the owner/name form, e.g. tessel-dev/site")]
    InvalidRepository(String),

    /// The archive was empty or not a tarball
    #[error("Malformed archive for {0}")]
    MalformedArchive(String),

    /// I/O errors while extracting
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type defaulting to the umbrella [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
