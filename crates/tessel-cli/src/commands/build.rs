use crate::cli::BuildArgs;
use crate::config::{ConfigOverrides, TesselConfig};
use crate::error::{CliError, Result, ResultExt};
use crate::ui;
use std::path::Path;
use std::time::Instant;
use walkdir::WalkDir;

/// Run one build and report where it landed.
pub async fn execute(args: BuildArgs, config_path: Option<&Path>) -> Result<()> {
    let overrides = ConfigOverrides {
        root: args.root,
        default_browser: args.browser,
        watch: Some(false),
        ..Default::default()
    };
    let config = TesselConfig::load(&overrides, config_path)?;
    config.validate()?;

    let started = Instant::now();
    let builder = super::builder(&config);
    let build = builder
        .ensure_built(&config.build_configuration(config.default_browser.clone()))
        .await?;

    ui::success(&format!(
        "Built {} for {} in {:.2?}",
        config.root.display(),
        config.default_browser,
        started.elapsed()
    ));

    match args.out {
        Some(out) => {
            copy_tree(&build.output_dir, &out)?;
            println!("{}", out.display());
        }
        None => println!("{}", build.output_dir.display()),
    }
    Ok(())
}

/// Copy every file under `from` into `to`, creating directories.
pub fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|e| CliError::Custom(format!("Failed to read build output: {}", e)))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| CliError::Custom(e.to_string()))?;
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).with_path(&target)?;
        } else {
            std::fs::copy(entry.path(), &target).with_path(entry.path())?;
        }
    }
    Ok(())
}
