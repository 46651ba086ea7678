use crate::cli::ResolveArgs;
use crate::error::{CliError, Result, ResultExt};
use crate::ui;
use std::sync::Arc;
use tessel_core::{MemoryArtifactStore, ModuleResolver};
use url::Url;

/// Resolve a module graph from local files and list every artifact.
pub async fn execute(args: ResolveArgs) -> Result<()> {
    let root = std::fs::canonicalize(&args.root).with_path(&args.root)?;
    let base = Url::from_directory_path(&root)
        .map_err(|_| CliError::InvalidArgument(format!("Cannot address {} as a URL", root.display())))?;

    let store = Arc::new(MemoryArtifactStore::default());
    let resolver = ModuleResolver::with_store(store);
    let handle = resolver.resolve(&args.module, &base).await?;

    let modules = resolver.cached();
    for (url, module_handle) in &modules {
        println!("{}\t{}", module_handle, url);
    }
    ui::success(&format!(
        "Resolved {} into {} ({} modules)",
        args.module,
        handle,
        modules.len()
    ));
    Ok(())
}
