//! Identify command - record the toolchain identity for later phases

use crate::cli::args::IdentifyArgs;
use crate::config::Settings;
use crate::error::RustcargoResult;
use crate::outputs::{names, OutputSink};
use crate::process::SystemRunner;
use crate::state::FilePhaseState;
use crate::toolchain::{extract_identity, ToolchainIdentity};
use console::style;

/// Execute the identify command
pub async fn execute(args: IdentifyArgs, settings: &Settings) -> RustcargoResult<()> {
    let runner = SystemRunner::new();
    let state = FilePhaseState::new(settings.state_file.clone());

    let identity = extract_identity(&runner, &state, &args.toolchain).await?;
    emit_identity(&identity, settings).await?;

    eprintln!(
        "{} rustc {} ({})",
        style("✓").green(),
        style(&identity.version).cyan(),
        identity.commit_hash
    );
    Ok(())
}

/// Expose the identity as step outputs
pub(crate) async fn emit_identity(
    identity: &ToolchainIdentity,
    settings: &Settings,
) -> RustcargoResult<()> {
    let outputs = OutputSink::new(settings.output_file.clone());
    outputs.set(names::RUST_VERSION, &identity.version).await?;
    outputs.set(names::RUST_HASH, &identity.commit_hash).await
}
