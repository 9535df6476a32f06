//! Remote cache service abstraction
//!
//! The service stores the bytes; this crate only decides keys and paths.
//! "Closest match" semantics for fallback prefixes belong to the service.

use super::key::{CacheKey, CacheKeyPrefixes};
use super::paths::CachePathSet;
use crate::error::{RustcargoError, RustcargoResult};
use crate::process::{display_command, ProcessRunner};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Save/restore service keyed by strings
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Whether the service can be used in this environment
    async fn is_available(&self) -> bool;

    /// Restore `paths` from the exact `primary` key or, failing that, from
    /// the newest entry matching each prefix in order. Returns the key that
    /// matched, or `None` on a miss.
    async fn restore(
        &self,
        paths: &CachePathSet,
        primary: &CacheKey,
        prefixes: &CacheKeyPrefixes,
    ) -> RustcargoResult<Option<String>>;

    /// Save `paths` under `key`
    async fn save(&self, paths: &CachePathSet, key: &CacheKey) -> RustcargoResult<()>;
}

/// Service reached through an external helper program.
///
/// The helper is invoked as
/// `<program> restore --key K [--restore-key P]... -- <paths>` (printing the
/// matched key, or nothing on a miss) and `<program> save --key K -- <paths>`.
pub struct CommandCacheService<'a> {
    program: Option<String>,
    runner: &'a dyn ProcessRunner,
}

impl<'a> CommandCacheService<'a> {
    pub fn new(program: Option<String>, runner: &'a dyn ProcessRunner) -> Self {
        Self { program, runner }
    }

    async fn invoke(&self, args: Vec<String>) -> RustcargoResult<String> {
        let program = self.program.as_deref().ok_or_else(|| {
            RustcargoError::CacheService("no cache command configured".to_string())
        })?;

        let output = self
            .runner
            .run(program, &args)
            .await
            .map_err(|e| RustcargoError::CacheService(e.to_string()))?;

        if !output.success() {
            return Err(RustcargoError::CacheService(format!(
                "{} exited with {}: {}",
                display_command(program, &args),
                output.code,
                output.stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}

fn path_args(paths: &CachePathSet) -> impl Iterator<Item = String> + '_ {
    paths
        .iter()
        .map(|entry| entry.path.to_string_lossy().into_owned())
}

#[async_trait]
impl CacheService for CommandCacheService<'_> {
    async fn is_available(&self) -> bool {
        self.program.is_some()
    }

    async fn restore(
        &self,
        paths: &CachePathSet,
        primary: &CacheKey,
        prefixes: &CacheKeyPrefixes,
    ) -> RustcargoResult<Option<String>> {
        let mut args = vec![
            "restore".to_string(),
            "--key".to_string(),
            primary.to_string(),
        ];
        for prefix in prefixes.iter() {
            args.push("--restore-key".to_string());
            args.push(prefix.clone());
        }
        args.push("--".to_string());
        args.extend(path_args(paths));

        let stdout = self.invoke(args).await?;
        let matched = stdout.trim();

        debug!("Cache helper matched key {:?}", matched);
        Ok((!matched.is_empty()).then(|| matched.to_string()))
    }

    async fn save(&self, paths: &CachePathSet, key: &CacheKey) -> RustcargoResult<()> {
        let mut args = vec!["save".to_string(), "--key".to_string(), key.to_string()];
        args.push("--".to_string());
        args.extend(path_args(paths));

        self.invoke(args).await.map(|_| ())
    }
}

/// A call observed by [`MemoryCacheService`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    Restore { key: String, prefixes: Vec<String> },
    Save { key: String, paths: Vec<PathBuf> },
}

/// In-process service with prefix matching, for harnesses and tests
#[derive(Default)]
pub struct MemoryCacheService {
    unavailable: bool,
    failing: bool,
    entries: Mutex<Vec<String>>,
    calls: Mutex<Vec<ServiceCall>>,
}

impl MemoryCacheService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a saved key (later keys are newer)
    pub fn with_entry(self, key: &str) -> Self {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(key.to_string());
        self
    }

    /// Report the service as unavailable
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Make every restore and save fail
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn saved_keys(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ServiceCall::Save { key, .. } => Some(key),
                ServiceCall::Restore { .. } => None,
            })
            .collect()
    }

    fn record(&self, call: ServiceCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

#[async_trait]
impl CacheService for MemoryCacheService {
    async fn is_available(&self) -> bool {
        !self.unavailable
    }

    async fn restore(
        &self,
        _paths: &CachePathSet,
        primary: &CacheKey,
        prefixes: &CacheKeyPrefixes,
    ) -> RustcargoResult<Option<String>> {
        self.record(ServiceCall::Restore {
            key: primary.to_string(),
            prefixes: prefixes.as_slice().to_vec(),
        });

        if self.failing {
            return Err(RustcargoError::CacheService("restore unavailable".to_string()));
        }

        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if entries.iter().any(|entry| primary == entry.as_str()) {
            return Ok(Some(primary.to_string()));
        }

        Ok(prefixes.iter().find_map(|prefix| {
            entries
                .iter()
                .rev()
                .find(|entry| entry.starts_with(prefix.as_str()))
                .cloned()
        }))
    }

    async fn save(&self, paths: &CachePathSet, key: &CacheKey) -> RustcargoResult<()> {
        self.record(ServiceCall::Save {
            key: key.to_string(),
            paths: paths.paths(),
        });

        if self.failing {
            return Err(RustcargoError::CacheService("quota exceeded".to_string()));
        }

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.iter().any(|entry| key == entry.as_str()) {
            return Err(RustcargoError::CacheService(format!(
                "key {key} already exists"
            )));
        }
        entries.push(key.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::KeySchema;
    use crate::cache::paths::resolve_cache_paths;
    use crate::process::testing::FakeRunner;
    use std::path::Path;

    const RESTORE_ABC: &str = concat!(
        "cache-helper restore --key ns-v1-linux-abc ",
        "--restore-key ns-v1-linux --restore-key ns-v1 ",
        "-- /cargo/registry /work/target/debug"
    );

    fn paths() -> CachePathSet {
        resolve_cache_paths(
            Path::new("/work"),
            Path::new("/cargo"),
            "debug",
            &["target".to_string()],
        )
        .unwrap()
    }

    fn schema() -> KeySchema {
        KeySchema::new("ns", 1, "linux")
    }

    fn key(digest: &str) -> CacheKey {
        schema().key(digest)
    }

    #[tokio::test]
    async fn memory_restore_prefers_exact_key() {
        let service = MemoryCacheService::new()
            .with_entry("ns-v1-linux-aaa")
            .with_entry("ns-v1-linux-bbb");

        let matched = service
            .restore(&paths(), &key("aaa"), &schema().prefixes())
            .await
            .unwrap();

        assert_eq!(matched.as_deref(), Some("ns-v1-linux-aaa"));
    }

    #[tokio::test]
    async fn memory_restore_falls_back_in_prefix_order() {
        let service = MemoryCacheService::new()
            .with_entry("ns-v1-macos-old")
            .with_entry("ns-v1-linux-older")
            .with_entry("ns-v1-linux-newer")
            .with_entry("ns-v1-windows-newest");

        let matched = service
            .restore(&paths(), &key("zzz"), &schema().prefixes())
            .await
            .unwrap();

        assert_eq!(matched.as_deref(), Some("ns-v1-linux-newer"));
    }

    #[tokio::test]
    async fn memory_restore_uses_platform_agnostic_fallback() {
        let service = MemoryCacheService::new().with_entry("ns-v1-macos-abc");

        let matched = service
            .restore(&paths(), &key("zzz"), &schema().prefixes())
            .await
            .unwrap();

        assert_eq!(matched.as_deref(), Some("ns-v1-macos-abc"));
    }

    #[tokio::test]
    async fn memory_save_rejects_duplicates() {
        let service = MemoryCacheService::new();
        service.save(&paths(), &key("abc")).await.unwrap();

        let err = service.save(&paths(), &key("abc")).await.unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(service.saved_keys().len(), 2);
    }

    #[tokio::test]
    async fn command_service_unavailable_without_program() {
        let runner = FakeRunner::default();
        assert!(!CommandCacheService::new(None, &runner).is_available().await);
        assert!(
            CommandCacheService::new(Some("cache-helper".to_string()), &runner)
                .is_available()
                .await
        );
    }

    #[tokio::test]
    async fn command_service_restore_reads_matched_key() {
        let runner = FakeRunner::default().respond(RESTORE_ABC, 0, "ns-v1-linux-old\n");
        let service = CommandCacheService::new(Some("cache-helper".to_string()), &runner);

        let matched = service
            .restore(&paths(), &key("abc"), &schema().prefixes())
            .await
            .unwrap();

        assert_eq!(matched.as_deref(), Some("ns-v1-linux-old"));
    }

    #[tokio::test]
    async fn command_service_empty_stdout_is_miss() {
        let runner = FakeRunner::default().respond(RESTORE_ABC, 0, "  \n");
        let service = CommandCacheService::new(Some("cache-helper".to_string()), &runner);

        let matched = service
            .restore(&paths(), &key("abc"), &schema().prefixes())
            .await
            .unwrap();

        assert!(matched.is_none());
    }

    #[tokio::test]
    async fn command_service_failures_are_recoverable() {
        let runner = FakeRunner::default().respond(
            "cache-helper save --key ns-v1-linux-abc -- /cargo/registry /work/target/debug",
            2,
            "",
        );
        let service = CommandCacheService::new(Some("cache-helper".to_string()), &runner);

        let err = service.save(&paths(), &key("abc")).await.unwrap_err();
        assert!(matches!(err, RustcargoError::CacheService(_)));

        // Spawn failures are downgraded too
        let spawn_err = service
            .restore(&paths(), &key("abc"), &schema().prefixes())
            .await
            .unwrap_err();
        assert!(!spawn_err.is_fatal());
    }
}
