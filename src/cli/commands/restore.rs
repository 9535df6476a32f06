//! Restore command - restore the build cache before compiling

use super::identify::emit_identity;
use crate::cache::{CacheLifecycle, CommandCacheService};
use crate::cli::args::RestoreArgs;
use crate::config::Settings;
use crate::error::RustcargoResult;
use crate::outputs::{names, OutputSink};
use crate::process::SystemRunner;
use crate::state::FilePhaseState;
use crate::toolchain::extract_identity;
use console::style;

/// Execute the restore command
pub async fn execute(args: RestoreArgs, settings: &Settings) -> RustcargoResult<()> {
    let runner = SystemRunner::new();
    let state = FilePhaseState::new(settings.state_file.clone());

    // An explicit channel always wins over whatever identity is recorded
    if let Some(channel) = &args.toolchain {
        let identity = extract_identity(&runner, &state, channel).await?;
        emit_identity(&identity, settings).await?;
    }

    let service = CommandCacheService::new(settings.cache_command.clone(), &runner);
    let lifecycle = CacheLifecycle::new(settings, &service, &state, &runner);

    let Some(outcome) = lifecycle.restore().await? else {
        return Ok(());
    };

    let outputs = OutputSink::new(settings.output_file.clone());
    outputs.set(names::CACHE_KEY, &outcome.key).await?;
    outputs
        .set(names::CACHE_HIT, if outcome.hit { "true" } else { "false" })
        .await?;

    if outcome.hit {
        eprintln!(
            "{} Restored cache {}",
            style("✓").green(),
            style(&outcome.key).cyan()
        );
    } else {
        eprintln!(
            "{} No cache found, will save as {}",
            style("!").yellow(),
            style(&outcome.key).cyan()
        );
    }

    Ok(())
}
