//! Driving the external bundler.
//!
//! The orchestrator talks to a [`Bundler`]: first
//! [`install`](Bundler::install) the folded dependency list into the build
//! workspace, then [`bundle`](Bundler::bundle) every entry for the target
//! browser. [`CommandBundler`] is the real implementation and shells out
//! to `npm` and `esbuild` with `tokio::process`.
//!
//! Output contract: for an entry `p` the bundler writes `p.bundle.js` and
//! `p.bundle.js.map` next to `p` inside the staged site.

use crate::error::BuildError;
use crate::rewrite::BundleEntry;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Everything one bundler run needs.
#[derive(Debug, Clone)]
pub struct BundleJob {
    /// Directory holding `package.json` and `node_modules`
    pub workspace_dir: PathBuf,
    /// Staged site directory the entries are relative to
    pub site_dir: PathBuf,
    /// Entries to bundle
    pub entries: Vec<BundleEntry>,
    /// esbuild target, e.g. `chrome80`
    pub target_browser: String,
}

/// External bundler boundary.
#[async_trait]
pub trait Bundler: Send + Sync {
    /// Install `dependencies` (`name@version`) into `workspace_dir`.
    async fn install(&self, workspace_dir: &Path, dependencies: &[String]) -> Result<(), BuildError>;

    /// Bundle every entry of `job`.
    async fn bundle(&self, job: &BundleJob) -> Result<(), BuildError>;

    /// Shell script equivalent of a run, saved into the workspace.
    fn describe(&self, _job: &BundleJob, _dependencies: &[String]) -> Option<String> {
        None
    }
}

/// Options for [`CommandBundler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundlerOptions {
    /// npm executable
    pub npm: PathBuf,
    /// esbuild executable; `None` prefers the workspace's
    /// `node_modules/.bin/esbuild`, then `esbuild` on PATH
    pub esbuild: Option<PathBuf>,
    pub minify: bool,
    pub sourcemap: bool,
}

impl Default for BundlerOptions {
    fn default() -> Self {
        Self {
            npm: PathBuf::from("npm"),
            esbuild: None,
            minify: true,
            sourcemap: true,
        }
    }
}

/// [`Bundler`] that runs `npm install` and `esbuild`.
#[derive(Debug, Clone, Default)]
pub struct CommandBundler {
    options: BundlerOptions,
}

impl CommandBundler {
    pub fn new(options: BundlerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &BundlerOptions {
        &self.options
    }

    fn esbuild_program(&self, workspace_dir: &Path) -> PathBuf {
        if let Some(esbuild) = &self.options.esbuild {
            return esbuild.clone();
        }
        let local = workspace_dir.join("node_modules").join(".bin").join("esbuild");
        if local.is_file() {
            local
        } else {
            PathBuf::from("esbuild")
        }
    }

    /// esbuild arguments for one entry.
    pub fn esbuild_args(&self, site_dir: &Path, entry: &BundleEntry, target: &str) -> Vec<String> {
        let mut args = vec![
            "--bundle".to_string(),
            format!("--outfile={}", site_dir.join(entry.bundle_path()).display()),
        ];
        if self.options.sourcemap {
            args.push("--sourcemap".to_string());
        }
        args.push("--platform=browser".to_string());
        args.push(format!("--target={target}"));
        if self.options.minify {
            args.push("--minify".to_string());
        }
        args.push(site_dir.join(entry.path()).display().to_string());
        args
    }

    /// The equivalent shell script for a job, written next to the build
    /// for debugging. It is not executed.
    pub fn build_script(&self, job: &BundleJob, dependencies: &[String]) -> String {
        let mut script = String::from("#!/bin/sh\nset -e\n");
        script.push_str(&format!("cd \"{}\"\n", job.workspace_dir.display()));
        if !dependencies.is_empty() {
            script.push_str(&format!(
                "{} install {}\n",
                self.options.npm.display(),
                dependencies.join(" ")
            ));
        }
        let esbuild = self.esbuild_program(&job.workspace_dir);
        for entry in &job.entries {
            let args = self.esbuild_args(&job.site_dir, entry, &job.target_browser);
            script.push_str(&format!("{} {}\n", esbuild.display(), args.join(" ")));
        }
        script
    }
}

#[async_trait]
impl Bundler for CommandBundler {
    async fn install(&self, workspace_dir: &Path, dependencies: &[String]) -> Result<(), BuildError> {
        if dependencies.is_empty() {
            return Ok(());
        }
        info!("Installing {} packages", dependencies.len());
        let mut args = vec!["install".to_string(), "--no-audit".to_string(), "--no-fund".to_string()];
        args.extend(dependencies.iter().cloned());
        run(&self.options.npm, &args, workspace_dir).await
    }

    fn describe(&self, job: &BundleJob, dependencies: &[String]) -> Option<String> {
        Some(self.build_script(job, dependencies))
    }

    async fn bundle(&self, job: &BundleJob) -> Result<(), BuildError> {
        let esbuild = self.esbuild_program(&job.workspace_dir);
        for entry in &job.entries {
            debug!("Bundling {} for {}", entry.path(), job.target_browser);
            let args = self.esbuild_args(&job.site_dir, entry, &job.target_browser);
            run(&esbuild, &args, &job.workspace_dir).await?;
        }
        Ok(())
    }
}

async fn run(program: &Path, args: &[String], cwd: &Path) -> Result<(), BuildError> {
    let command_line = format!("{} {}", program.display(), args.join(" "));
    debug!("Running {}", command_line);

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| BuildError::Spawn {
            program: program.display().to_string(),
            source,
        })?;

    if output.status.success() {
        Ok(())
    } else {
        Err(BuildError::CommandFailed {
            command: command_line,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(dir: &Path) -> BundleJob {
        BundleJob {
            workspace_dir: dir.to_path_buf(),
            site_dir: dir.join(".dist"),
            entries: vec![BundleEntry::source("app.ts")],
            target_browser: "safari13".to_string(),
        }
    }

    #[test]
    fn test_esbuild_args() {
        let bundler = CommandBundler::default();
        let args = bundler.esbuild_args(Path::new("/w/.dist"), &BundleEntry::source("js/app.ts"), "chrome80");
        assert_eq!(
            args,
            vec![
                "--bundle",
                "--outfile=/w/.dist/js/app.ts.bundle.js",
                "--sourcemap",
                "--platform=browser",
                "--target=chrome80",
                "--minify",
                "/w/.dist/js/app.ts",
            ]
        );
    }

    #[test]
    fn test_esbuild_args_without_minify_or_sourcemap() {
        let bundler = CommandBundler::new(BundlerOptions {
            minify: false,
            sourcemap: false,
            ..BundlerOptions::default()
        });
        let args = bundler.esbuild_args(Path::new("/w"), &BundleEntry::source("a.js"), "firefox100");
        assert!(!args.iter().any(|a| a == "--minify" || a == "--sourcemap"));
    }

    #[test]
    fn test_build_script_lists_install_then_entries() {
        let bundler = CommandBundler::new(BundlerOptions {
            esbuild: Some(PathBuf::from("esbuild")),
            ..BundlerOptions::default()
        });
        let script = bundler.build_script(&job(Path::new("/w")), &["react@18".to_string()]);
        let install = script.find("npm install react@18").unwrap();
        let bundle = script.find("esbuild --bundle").unwrap();
        assert!(install < bundle);
        assert!(script.contains("--target=safari13"));
    }

    #[tokio::test]
    async fn test_install_without_dependencies_is_a_no_op() {
        let bundler = CommandBundler::new(BundlerOptions {
            npm: PathBuf::from("/nonexistent/npm"),
            ..BundlerOptions::default()
        });
        bundler.install(Path::new("."), &[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_program_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let bundler = CommandBundler::new(BundlerOptions {
            esbuild: Some(PathBuf::from("/nonexistent/esbuild")),
            ..BundlerOptions::default()
        });
        let err = bundler.bundle(&job(dir.path())).await.unwrap_err();
        assert!(matches!(err, BuildError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_fails() {
        let dir = tempfile::tempdir().unwrap();
        let bundler = CommandBundler::new(BundlerOptions {
            esbuild: Some(PathBuf::from("false")),
            ..BundlerOptions::default()
        });
        let err = bundler.bundle(&job(dir.path())).await.unwrap_err();
        assert!(matches!(err, BuildError::CommandFailed { .. }));
    }
}
