//! Configuration file schema for rustcargo
//!
//! The optional file lives at `./rustcargo.toml` (or wherever `--config`
//! points). Every table and field is optional; CLI flags and environment
//! variables take precedence over anything set here.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cache behaviour
    pub cache: CacheConfig,

    /// Filesystem locations
    pub paths: PathsConfig,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable caching (default: true)
    pub enabled: bool,

    /// Build profile whose output directory is cached
    pub target_profile: String,

    /// Comma-delimited build output roots, relative to the workspace
    pub target_dirs: String,

    /// Identifier separating concurrent jobs' caches
    pub job_id: Option<String>,

    /// Base branch for warm-up runs; loosens the cache key when set
    pub cache_base: Option<String>,

    /// Helper program that talks to the remote cache service
    pub command: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_profile: "debug".to_string(),
            target_dirs: "target".to_string(),
            job_id: None,
            cache_base: None,
            command: None,
        }
    }
}

/// Filesystem locations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Workspace root (defaults to the current directory)
    pub workspace: Option<PathBuf>,

    /// Cargo home (defaults to `$CARGO_HOME` or `~/.cargo`)
    pub cargo_home: Option<PathBuf>,

    /// File carrying state from the restore phase to the save phase
    pub state_file: Option<PathBuf>,

    /// File receiving `name=value` step outputs
    pub output_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[cache]"));
        assert!(toml.contains("target_profile = \"debug\""));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.target_dirs, "target");
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [cache]
            target_profile = "release"
            job_id = "lint"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.cache.target_profile, "release");
        assert_eq!(config.cache.job_id.as_deref(), Some("lint"));
        assert_eq!(config.cache.target_dirs, "target"); // default preserved
        assert!(config.paths.cargo_home.is_none());
    }
}
