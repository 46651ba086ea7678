use crate::cli::FetchArgs;
use crate::config::{ConfigOverrides, TesselConfig};
use crate::error::Result;
use crate::ui;
use std::path::Path;
use tessel_core::RemoteSource;

/// Download a repository and print its local directory.
pub async fn execute(args: FetchArgs, config_path: Option<&Path>) -> Result<()> {
    let overrides = ConfigOverrides {
        cache_dir: args.cache_dir,
        ..Default::default()
    };
    let config = TesselConfig::load(&overrides, config_path)?;

    let source = RemoteSource::new(&config.cache_dir);
    let dir = source.acquire(&args.repository, &args.branch).await?;

    ui::success(&format!("Fetched {}@{}", args.repository, args.branch));
    println!("{}", dir.display());
    Ok(())
}
