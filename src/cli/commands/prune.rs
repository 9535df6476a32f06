//! Prune command - shrink the cache payload without saving

use crate::cache::{resolve_cache_paths, Pruner};
use crate::config::Settings;
use crate::error::RustcargoResult;
use crate::process::SystemRunner;
use console::style;

/// Execute the prune command
pub async fn execute(settings: &Settings) -> RustcargoResult<()> {
    let paths = resolve_cache_paths(
        &settings.workspace_root,
        &settings.cargo_home,
        &settings.target_profile,
        &settings.target_dirs,
    )?
    .existing()
    .await;

    if paths.is_empty() {
        eprintln!("{} No cache paths exist, nothing to prune", style("!").yellow());
        return Ok(());
    }

    let runner = SystemRunner::new();
    let report = Pruner::new(&runner).prune(&paths).await;

    for path in &report.removed {
        println!("{} {}", style("-").red(), path.display());
    }
    for failure in &report.failures {
        eprintln!(
            "{} {}: {}",
            style("!").yellow(),
            failure.path.display(),
            failure.reason
        );
    }

    eprintln!(
        "{} Removed {} path(s)",
        style("✓").green(),
        report.removed.len()
    );
    Ok(())
}
