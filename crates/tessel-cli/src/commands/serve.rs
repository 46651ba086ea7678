use crate::cli::ServeArgs;
use crate::config::{ConfigOverrides, HeadlessOverrides, TesselConfig};
use crate::error::{CliError, Result};
use crate::server::{AppState, router};
use crate::ui;
use std::path::Path;
use std::sync::Arc;
use tessel_browser::HeadlessRuntime;
use tessel_core::PageExecutor;
use tokio::net::TcpListener;

/// Serve the site until interrupted.
pub async fn execute(args: ServeArgs, config_path: Option<&Path>) -> Result<()> {
    let config = TesselConfig::load(&overrides(args), config_path)?;
    config.validate()?;

    let runtime = Arc::new(HeadlessRuntime::new(config.headless_config()));
    let executor = Arc::new(PageExecutor::new().with_runtime(runtime.clone()));
    let builder = super::builder(&config);

    let addr = config.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| CliError::Server(format!("Failed to bind to {}: {}", addr, e)))?;
    let local = listener.local_addr()?;

    ui::success(&format!(
        "Serving {} at http://{}",
        config.root.display(),
        local
    ));
    if config.watch {
        ui::info("Builds are refreshed when their sources change");
    }

    let app = router(AppState::new(builder, executor, config));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| CliError::Server(e.to_string()))?;

    runtime.shutdown().await?;
    ui::info("Server stopped");
    Ok(())
}

fn overrides(args: ServeArgs) -> ConfigOverrides {
    ConfigOverrides {
        root: args.root,
        host: args.host,
        port: args.port,
        default_browser: args.browser,
        watch: args.no_watch.then_some(false),
        headless: args.chrome_path.map(|path| HeadlessOverrides {
            chrome_path: Some(path),
        }),
        ..Default::default()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        ui::warning(&format!("Cannot listen for Ctrl-C: {}", e));
        std::future::pending::<()>().await;
    }
}
