//! Toolchain identity extraction
//!
//! Reads `rustc --version --verbose` and keeps the two fields that feed
//! the cache key: the release version and the commit hash. The identity is
//! persisted to phase state as soon as it is known so later phases never
//! need to invoke the compiler again.

use crate::error::{RustcargoError, RustcargoResult};
use crate::process::{run_checked, ProcessRunner};
use crate::state::{keys, PhaseState};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Line prefix carrying the toolchain commit hash
const COMMIT_HASH_MARKER: &str = "commit-hash";
/// Line prefix carrying the toolchain version
const RELEASE_MARKER: &str = "release";

/// Resolved compiler version and source commit.
///
/// Empty fields are valid: they mean the toolchain did not report them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolchainIdentity {
    /// Release version (e.g., "1.75.0")
    pub version: String,
    /// Commit hash of the compiler build
    pub commit_hash: String,
}

impl ToolchainIdentity {
    pub fn new(version: impl Into<String>, commit_hash: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            commit_hash: commit_hash.into(),
        }
    }

    /// Load a previously persisted identity; missing fields become empty
    pub async fn load(state: &dyn PhaseState) -> RustcargoResult<Self> {
        Ok(Self {
            version: state.get(keys::RUST_VERSION).await?.unwrap_or_default(),
            commit_hash: state.get(keys::RUST_HASH).await?.unwrap_or_default(),
        })
    }

    /// Persist both fields for later phases
    pub async fn persist(&self, state: &dyn PhaseState) -> RustcargoResult<()> {
        state.set(keys::RUST_VERSION, &self.version).await?;
        state.set(keys::RUST_HASH, &self.commit_hash).await?;
        Ok(())
    }

    /// Whether neither field is known
    pub fn is_empty(&self) -> bool {
        self.version.is_empty() && self.commit_hash.is_empty()
    }
}

/// Parse verbose version output into an identity.
///
/// Lines matching neither marker are ignored. A marker line without a
/// colon is a [`RustcargoError::Parse`] error.
pub fn parse_identity(output: &str) -> RustcargoResult<ToolchainIdentity> {
    let mut identity = ToolchainIdentity::default();

    for line in output.lines() {
        if line.starts_with(COMMIT_HASH_MARKER) {
            identity.commit_hash = marker_value(line)?;
        } else if line.starts_with(RELEASE_MARKER) {
            identity.version = marker_value(line)?;
        }
    }

    Ok(identity)
}

fn marker_value(line: &str) -> RustcargoResult<String> {
    line.split_once(':')
        .map(|(_, value)| value.trim().to_string())
        .ok_or_else(|| RustcargoError::Parse {
            line: line.to_string(),
            reason: "expected '<marker>: <value>'".to_string(),
        })
}

/// Arguments for the verbose version query of `channel`
fn version_args(channel: &str) -> Vec<String> {
    let mut args = Vec::with_capacity(3);
    if !channel.is_empty() {
        args.push(format!("+{channel}"));
    }
    args.push("--version".to_string());
    args.push("--verbose".to_string());
    args
}

/// Query the compiler for `channel`, parse its identity and persist it
pub async fn extract_identity(
    runner: &dyn ProcessRunner,
    state: &dyn PhaseState,
    channel: &str,
) -> RustcargoResult<ToolchainIdentity> {
    info!("Extracting toolchain identity for {}", channel);

    let output = run_checked(runner, "rustc", &version_args(channel)).await?;
    let identity = parse_identity(&output.stdout)?;

    debug!(
        "Toolchain version = {}, commit hash = {}",
        identity.version, identity.commit_hash
    );

    identity.persist(state).await?;
    Ok(identity)
}
