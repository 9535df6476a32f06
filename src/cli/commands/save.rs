//! Save command - prune and save the build cache after compiling

use crate::cache::{CacheLifecycle, CommandCacheService, SaveOutcome};
use crate::config::Settings;
use crate::error::RustcargoResult;
use crate::process::SystemRunner;
use crate::state::FilePhaseState;
use console::style;

/// Execute the save command
pub async fn execute(settings: &Settings) -> RustcargoResult<()> {
    let runner = SystemRunner::new();
    let state = FilePhaseState::new(settings.state_file.clone());
    let service = CommandCacheService::new(settings.cache_command.clone(), &runner);

    let outcome = CacheLifecycle::new(settings, &service, &state, &runner)
        .save()
        .await?;

    match outcome {
        SaveOutcome::Disabled => {}
        SaveOutcome::SkippedExactHit { key } => eprintln!(
            "{} Cache {} was restored exactly, nothing to save",
            style("✓").green(),
            style(key).cyan()
        ),
        SaveOutcome::SkippedNoPaths { .. } => eprintln!(
            "{} No cache paths exist, nothing to save",
            style("!").yellow()
        ),
        SaveOutcome::Saved { key, prune } => {
            eprintln!("{} Saved cache {}", style("✓").green(), style(key).cyan());
            if !prune.is_clean() {
                eprintln!(
                    "  {} {} path(s) could not be pruned",
                    style("!").yellow(),
                    prune.failures.len()
                );
            }
        }
        SaveOutcome::Failed { key, reason } => eprintln!(
            "{} Could not save cache {}: {}",
            style("!").yellow(),
            style(key).cyan(),
            reason
        ),
    }

    Ok(())
}
