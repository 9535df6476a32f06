//! Cross-phase durable state
//!
//! The restore and save phases run in separate processes. Anything the save
//! phase needs from earlier steps (toolchain identity, the restored key)
//! travels through a [`PhaseState`] store rather than process memory.

use crate::error::{RustcargoError, RustcargoResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tokio::fs;
use tracing::debug;

/// Well-known state keys
pub mod keys {
    /// Toolchain release version
    pub const RUST_VERSION: &str = "rust-version";
    /// Toolchain commit hash
    pub const RUST_HASH: &str = "rust-hash";
    /// Key that matched during restore
    pub const CACHE_HIT_KEY: &str = "cache-hit-key";
}

/// String key-value store scoped to one pipeline run
#[async_trait]
pub trait PhaseState: Send + Sync {
    /// Read a value; `None` when never set
    async fn get(&self, key: &str) -> RustcargoResult<Option<String>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> RustcargoResult<()>;

    /// Forget a value; removing an absent key is not an error
    async fn remove(&self, key: &str) -> RustcargoResult<()>;
}

/// State persisted as a JSON object in a file
pub struct FilePhaseState {
    path: PathBuf,
}

impl FilePhaseState {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> RustcargoResult<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&self.path).await.map_err(|e| {
            RustcargoError::io(format!("reading state file {}", self.path.display()), e)
        })?;

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        Ok(serde_json::from_str(&content)?)
    }

    async fn write_all(&self, entries: &BTreeMap<String, String>) -> RustcargoResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| RustcargoError::io("creating state directory", e))?;
        }

        let content = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");

        fs::write(&tmp, content)
            .await
            .map_err(|e| RustcargoError::io(format!("writing state file {}", tmp.display()), e))?;
        fs::rename(&tmp, &self.path).await.map_err(|e| {
            RustcargoError::io(format!("replacing state file {}", self.path.display()), e)
        })?;

        Ok(())
    }
}

#[async_trait]
impl PhaseState for FilePhaseState {
    async fn get(&self, key: &str) -> RustcargoResult<Option<String>> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> RustcargoResult<()> {
        let mut entries = self.read_all().await?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries).await?;

        debug!("Saved state {} = {}", key, value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> RustcargoResult<()> {
        let mut entries = self.read_all().await?;
        if entries.remove(key).is_some() {
            self.write_all(&entries).await?;
            debug!("Cleared state {}", key);
        }
        Ok(())
    }
}

/// In-memory state for single-process harnesses
#[derive(Default)]
pub struct MemoryPhaseState {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryPhaseState {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PhaseState for MemoryPhaseState {
    async fn get(&self, key: &str) -> RustcargoResult<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> RustcargoResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> RustcargoResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn file_state_missing_file_reads_none() {
        let dir = TempDir::new().unwrap();
        let state = FilePhaseState::new(dir.path().join("state.json"));

        assert_eq!(state.get(keys::RUST_VERSION).await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_state_survives_new_instance() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let restore_phase = FilePhaseState::new(path.clone());
        restore_phase.set(keys::RUST_VERSION, "1.75.0").await.unwrap();
        restore_phase.set(keys::CACHE_HIT_KEY, "ns-v1-linux-abc").await.unwrap();

        // A separate process would open the same file
        let save_phase = FilePhaseState::new(path);
        assert_eq!(
            save_phase.get(keys::RUST_VERSION).await.unwrap().as_deref(),
            Some("1.75.0")
        );
        assert_eq!(
            save_phase.get(keys::CACHE_HIT_KEY).await.unwrap().as_deref(),
            Some("ns-v1-linux-abc")
        );
    }

    #[tokio::test]
    async fn file_state_overwrites_value() {
        let dir = TempDir::new().unwrap();
        let state = FilePhaseState::new(dir.path().join("state.json"));

        state.set(keys::RUST_HASH, "old").await.unwrap();
        state.set(keys::RUST_HASH, "new").await.unwrap();

        assert_eq!(state.get(keys::RUST_HASH).await.unwrap().as_deref(), Some("new"));
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[tokio::test]
    async fn file_state_remove_keeps_other_keys() {
        let dir = TempDir::new().unwrap();
        let state = FilePhaseState::new(dir.path().join("state.json"));

        state.set(keys::RUST_VERSION, "1.75.0").await.unwrap();
        state.set(keys::CACHE_HIT_KEY, "ns-v1-linux-abc").await.unwrap();
        state.remove(keys::CACHE_HIT_KEY).await.unwrap();
        state.remove(keys::CACHE_HIT_KEY).await.unwrap();

        assert!(state.get(keys::CACHE_HIT_KEY).await.unwrap().is_none());
        assert_eq!(
            state.get(keys::RUST_VERSION).await.unwrap().as_deref(),
            Some("1.75.0")
        );
    }

    #[tokio::test]
    async fn file_state_rejects_corrupt_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = FilePhaseState::new(path).get("x").await.unwrap_err();
        assert!(matches!(err, RustcargoError::Json(_)));
    }

    #[tokio::test]
    async fn memory_state_roundtrip() {
        let state = MemoryPhaseState::new();
        state.set("k", "v").await.unwrap();

        assert_eq!(state.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(state.get("missing").await.unwrap(), None);
    }
}
