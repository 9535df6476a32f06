//! Error types for rustcargo
//!
//! All modules use `RustcargoResult<T>` as their return type. Only
//! `CacheService` failures are recoverable; the lifecycle orchestrator
//! downgrades them to warnings so a cache outage never fails a build.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for rustcargo operations
pub type RustcargoResult<T> = Result<T, RustcargoError>;

/// All errors that can occur in rustcargo
#[derive(Error, Debug)]
pub enum RustcargoError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    // External tool errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("External tool failed: {command}, exit code: {code}, stderr: {stderr}")]
    ExternalTool {
        command: String,
        code: i32,
        stderr: String,
    },

    // Diagnostic output errors
    #[error("Malformed toolchain output line {line:?}: {reason}")]
    Parse { line: String, reason: String },

    // Remote cache errors
    #[error("Cache service error: {0}")]
    CacheService(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl RustcargoError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed (spawn) error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create an error for a tool that ran but exited non-zero
    pub fn external_tool(command: impl Into<String>, code: i32, stderr: impl Into<String>) -> Self {
        Self::ExternalTool {
            command: command.into(),
            code,
            stderr: stderr.into(),
        }
    }

    /// Whether this error must abort the current phase
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::CacheService(_))
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Config(_) => Some("Check --target-dirs and --cargo-home, or the config file"),
            Self::ConfigInvalid { .. } => Some("Check the [cache] and [paths] tables"),
            Self::CommandFailed { .. } => Some("Make sure the toolchain is installed and on PATH"),
            Self::Parse { .. } => Some("Run: rustc --version --verbose, and check its output"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = RustcargoError::external_tool("rustc +stable --version --verbose", 1, "boom");
        assert!(err.to_string().contains("exit code: 1"));
    }

    #[test]
    fn error_hint() {
        let err = RustcargoError::Config("target dirs empty".to_string());
        assert!(err.hint().unwrap().contains("--target-dirs"));
        assert!(RustcargoError::CacheService("quota".to_string()).hint().is_none());
    }

    #[test]
    fn only_cache_service_errors_are_recoverable() {
        assert!(!RustcargoError::CacheService("conflict".to_string()).is_fatal());
        assert!(RustcargoError::Config("x".to_string()).is_fatal());
        assert!(RustcargoError::Parse {
            line: "commit-hash".to_string(),
            reason: "missing ':'".to_string(),
        }
        .is_fatal());
    }
}
