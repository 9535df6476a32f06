//! The resolved configuration record

use super::{Config, ConfigManager};
use crate::error::{RustcargoError, RustcargoResult};
use std::path::PathBuf;

/// Values supplied on the command line or through environment variables.
///
/// `None` means "not given"; the config file or a built-in default applies.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub cache_enabled: Option<bool>,
    pub target_profile: Option<String>,
    pub target_dirs: Option<String>,
    pub job_id: Option<String>,
    pub cache_base: Option<String>,
    pub base_ref: Option<String>,
    pub workspace: Option<PathBuf>,
    pub cargo_home: Option<PathBuf>,
    pub state_file: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
    pub cache_command: Option<String>,
    /// CI run identifier, scopes the default state file
    pub run_id: Option<String>,
    /// Attempt number of a re-run CI run
    pub run_attempt: Option<String>,
}

/// Fully resolved settings for one phase invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Caching switch; when false every phase is a no-op
    pub cache_enabled: bool,
    /// Build profile, e.g. "debug" or "release"
    pub target_profile: String,
    /// Build output roots relative to the workspace, never empty
    pub target_dirs: Vec<String>,
    /// Optional job discriminator fed into the key
    pub job_discriminator: Option<String>,
    /// Warm-up base branch; switches the key strategy when set
    pub cache_base: Option<String>,
    /// Pull request base ref, only consulted by the warm-up strategy
    pub base_ref: Option<String>,
    pub workspace_root: PathBuf,
    pub cargo_home: PathBuf,
    pub state_file: PathBuf,
    pub output_file: Option<PathBuf>,
    /// Helper program bound to the remote cache service
    pub cache_command: Option<String>,
}

impl Settings {
    /// Merge CLI overrides over the config file over built-in defaults
    pub fn resolve(config: &Config, overrides: Overrides) -> RustcargoResult<Self> {
        let cache = &config.cache;
        let paths = &config.paths;

        let raw_dirs = overrides
            .target_dirs
            .unwrap_or_else(|| cache.target_dirs.clone());
        let target_dirs = parse_target_dirs(&raw_dirs)?;

        let target_profile = non_blank(overrides.target_profile)
            .or_else(|| non_blank(Some(cache.target_profile.clone())))
            .unwrap_or_else(|| "debug".to_string());

        let workspace_root = match overrides.workspace.or_else(|| paths.workspace.clone()) {
            Some(path) => path,
            None => std::env::current_dir()
                .map_err(|e| RustcargoError::io("getting current directory", e))?,
        };

        let cargo_home = overrides
            .cargo_home
            .or_else(|| paths.cargo_home.clone())
            .or_else(|| dirs::home_dir().map(|home| home.join(".cargo")))
            .ok_or_else(|| {
                RustcargoError::Config("cannot locate cargo home, set CARGO_HOME".to_string())
            })?;

        Ok(Self {
            cache_enabled: overrides.cache_enabled.unwrap_or(cache.enabled),
            target_profile,
            target_dirs,
            job_discriminator: non_blank(overrides.job_id.or_else(|| cache.job_id.clone())),
            cache_base: non_blank(overrides.cache_base.or_else(|| cache.cache_base.clone())),
            base_ref: non_blank(overrides.base_ref),
            workspace_root,
            cargo_home,
            state_file: overrides
                .state_file
                .or_else(|| paths.state_file.clone())
                .unwrap_or_else(|| {
                    let scope = run_scope(overrides.run_id, overrides.run_attempt);
                    ConfigManager::default_state_file(scope.as_deref())
                }),
            output_file: overrides.output_file.or_else(|| paths.output_file.clone()),
            cache_command: non_blank(overrides.cache_command.or_else(|| cache.command.clone())),
        })
    }
}

/// Split a comma-delimited list of target directories.
///
/// Entries are trimmed and blanks dropped; an empty result is a
/// configuration error rather than "cache nothing".
pub fn parse_target_dirs(raw: &str) -> RustcargoResult<Vec<String>> {
    let dirs: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|dir| !dir.is_empty())
        .map(String::from)
        .collect();

    if dirs.is_empty() {
        return Err(RustcargoError::Config(format!(
            "target directories must list at least one path, got {raw:?}"
        )));
    }

    Ok(dirs)
}

/// `<run id>-<attempt>`, or just the run id when no attempt is known
fn run_scope(run_id: Option<String>, run_attempt: Option<String>) -> Option<String> {
    let run_id = non_blank(run_id)?;
    Some(match non_blank(run_attempt) {
        Some(attempt) => format!("{run_id}-{attempt}"),
        None => run_id,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
