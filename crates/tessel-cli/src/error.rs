//! Error handling for the tessel CLI.
//!
//! [`CliError`] is what every command returns. Pipeline failures arrive
//! as [`tessel_core::Error`] or [`tessel_browser::BrowserError`];
//! configuration problems found by the CLI itself are [`ConfigError`]s.
//! `main` turns the final error into a miette report.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file, environment or flag problems
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Failures inside the build, render, resolve or fetch pipeline
    #[error("{0}")]
    Core(#[from] tessel_core::Error),

    /// Headless browser failures
    #[error("Browser error: {0}")]
    Browser(#[from] tessel_browser::BrowserError),

    /// Invalid command-line arguments
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// File or directory not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// I/O errors from file system operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Server bind or serve failures
    #[error("Server error: {0}")]
    Server(String),

    /// Generic errors with custom messages
    #[error("{0}")]
    Custom(String),
}

macro_rules! from_core_error {
    ($($error:ident),* $(,)?) => {
        $(
            impl From<tessel_core::$error> for CliError {
                fn from(err: tessel_core::$error) -> Self {
                    CliError::Core(err.into())
                }
            }
        )*
    };
}

from_core_error!(BuildError, RenderError, ResolutionError, SourceError);

impl From<tessel_core::ConfigError> for CliError {
    fn from(err: tessel_core::ConfigError) -> Self {
        CliError::Core(err.into())
    }
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly named config file does not exist
    #[error("Config file not found: {}\n\nHint: Create a tessel.config.json file or drop --config", .0.display())]
    NotFound(PathBuf),

    /// The merged configuration does not deserialize
    #[error("Invalid configuration: {0}\n\nHint: Check tessel.config.json syntax and TESSEL_* variables")]
    Invalid(String),

    /// Invalid value for a configuration option
    #[error("Invalid value for '{field}': {value}\n\nHint: {hint}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The invalid value
        value: String,
        /// Helpful hint for correct values
        hint: String,
    },
}

/// Result type alias using `CliError` as the default error type.
pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Extension trait for attaching the offending path to I/O errors.
pub trait ResultExt<T> {
    /// Turn a not-found I/O error into [`CliError::FileNotFound`] for `path`.
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| match e.into() {
            CliError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                CliError::FileNotFound(path.as_ref().to_path_buf())
            }
            other => other,
        })
    }
}

/// Convert a CLI error into a miette report for display.
pub fn cli_error_to_miette(err: CliError) -> miette::Report {
    match err {
        CliError::Core(tessel_core::Error::Build(e)) => miette::miette!("Build failed: {}", e),
        CliError::Core(tessel_core::Error::Render(e)) => miette::miette!("Render failed: {}", e),
        CliError::Core(tessel_core::Error::Resolution(e)) => {
            miette::miette!("Module resolution failed: {}", e)
        }
        _ => miette::miette!("{}", err),
    }
}
