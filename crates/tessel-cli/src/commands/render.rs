use crate::cli::RenderArgs;
use crate::config::{ConfigOverrides, HeadlessOverrides, TesselConfig};
use crate::error::{CliError, Result, ResultExt};
use std::path::Path;
use std::sync::Arc;
use tessel_browser::HeadlessRuntime;
use tessel_core::PageExecutor;
use tessel_core::site::resolve_site_path;

/// Build the site and print one rendered page.
pub async fn execute(args: RenderArgs, config_path: Option<&Path>) -> Result<()> {
    let page = resolve_site_path("", &args.page)
        .ok_or_else(|| CliError::InvalidArgument(format!("'{}' is not a page inside the site", args.page)))?;

    let overrides = ConfigOverrides {
        root: args.root,
        default_browser: args.browser,
        watch: Some(false),
        headless: args.chrome_path.map(|path| HeadlessOverrides {
            chrome_path: Some(path),
        }),
        ..Default::default()
    };
    let config = TesselConfig::load(&overrides, config_path)?;
    config.validate()?;

    let builder = super::builder(&config);
    let build = builder
        .ensure_built(&config.build_configuration(config.default_browser.clone()))
        .await?;

    let file = build.output_dir.join(&page);
    let html = tokio::fs::read_to_string(&file).await.with_path(&file)?;

    let runtime = Arc::new(HeadlessRuntime::new(config.headless_config()));
    let executor = PageExecutor::new().with_runtime(runtime.clone());
    let rendered = executor
        .render_page(&html, &build.output_dir, Some(&page))
        .await;
    runtime.shutdown().await?;

    println!("{}", rendered?);
    Ok(())
}
