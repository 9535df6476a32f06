//! Configuration management for rustcargo
//!
//! Configuration is resolved exactly once, at the process boundary, into a
//! [`Settings`] record that is passed down explicitly. Nothing below `main`
//! reads the environment.

pub mod schema;
mod settings;

pub use schema::Config;
pub use settings::{parse_target_dirs, Overrides, Settings};

use crate::error::{RustcargoError, RustcargoResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// File name looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "rustcargo.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the state directory path
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rustcargo")
    }

    /// Default location of the cross-phase state file.
    ///
    /// `run_scope` identifies the pipeline run so that persistent runners do
    /// not carry state from one run into the next.
    pub fn default_state_file(run_scope: Option<&str>) -> PathBuf {
        let name = match run_scope {
            Some(scope) => format!("phase-state-{scope}.json"),
            None => "phase-state.json".to_string(),
        };
        Self::state_dir().join(name)
    }

    /// Load configuration, falling back to defaults if the file is absent
    pub async fn load(&self) -> RustcargoResult<Config> {
        if !self.config_path.exists() {
            debug!(
                "Config file {} not found, using defaults",
                self.config_path.display()
            );
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> RustcargoResult<Config> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            RustcargoError::io(format!("reading config from {}", path.display()), e)
        })?;

        toml::from_str(&content).map_err(|e| RustcargoError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
