//! Pre-save pruning
//!
//! Removes content that is cheap to regenerate but expensive to upload:
//! downloaded registry sources, per-entry index lookup caches, incremental
//! compilation state, example binaries and dep-info files.
//!
//! Pruning is best-effort. Every deletion is attempted independently and
//! failures are collected into a [`PruneReport`] instead of aborting.

use super::paths::{CachePathKind, CachePathSet};
use crate::process::ProcessRunner;
use futures_util::future::join_all;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Target subdirectories that CI never reuses
const DISPOSABLE_TARGET_DIRS: &[&str] = &["examples", "incremental"];

/// Suffix of compiler dependency-info files
const DEP_INFO_SUFFIX: &str = ".d";

/// Marker identifying a registry index fetched through git
const GIT_MARKER: &str = ".git";

/// Per-entry lookup cache inside a registry index
const INDEX_CACHE_DIR: &str = ".cache";

/// Tells `cargo cache` which registry to clean
const CARGO_HOME_ENV: &str = "CARGO_HOME";

/// A deletion that did not happen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a pruning pass
#[derive(Debug, Clone, Default)]
pub struct PruneReport {
    /// Paths that were deleted
    pub removed: Vec<PathBuf>,
    /// Deletions (or maintenance commands) that failed
    pub failures: Vec<PruneFailure>,
}

impl PruneReport {
    fn merge(&mut self, other: PruneReport) {
        self.removed.extend(other.removed);
        self.failures.extend(other.failures);
    }

    fn fail(&mut self, path: &Path, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("Failed to prune {}: {}", path.display(), reason);
        self.failures.push(PruneFailure {
            path: path.to_path_buf(),
            reason,
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Cleans cache roots before they are saved
pub struct Pruner<'a> {
    runner: &'a dyn ProcessRunner,
}

impl<'a> Pruner<'a> {
    pub fn new(runner: &'a dyn ProcessRunner) -> Self {
        Self { runner }
    }

    /// Prune every root in `paths`. Never fails; see the returned report.
    pub async fn prune(&self, paths: &CachePathSet) -> PruneReport {
        info!("Cleaning cache before saving");

        let passes = paths.iter().map(|entry| async move {
            match entry.kind {
                CachePathKind::Registry => self.prune_registry(&entry.path).await,
                CachePathKind::Target => prune_target(&entry.path).await,
            }
        });

        let mut report = PruneReport::default();
        for pass in join_all(passes).await {
            report.merge(pass);
        }

        info!(
            "Pruned {} path(s), {} failure(s)",
            report.removed.len(),
            report.failures.len()
        );
        report
    }

    async fn prune_registry(&self, registry: &Path) -> PruneReport {
        let mut report = PruneReport::default();

        // Drops extracted sources under registry/src of this cargo home only
        let args = vec!["cache".to_string(), "--autoclean".to_string()];
        let env: Vec<(String, String)> = registry
            .parent()
            .map(|home| vec![(CARGO_HOME_ENV.to_string(), home.display().to_string())])
            .unwrap_or_default();
        match self.runner.run_with_env("cargo", &args, &env).await {
            Ok(output) if output.success() => debug!("cargo cache --autoclean finished"),
            Ok(output) => report.fail(
                registry,
                format!("cargo cache --autoclean exited with {}", output.code),
            ),
            Err(e) => report.fail(registry, e.to_string()),
        }

        let candidates = index_cache_dirs(&registry.join("index")).await;
        report.merge(remove_all(candidates).await);
        report
    }
}

/// `.cache` directories of git-backed registry indexes
async fn index_cache_dirs(index_root: &Path) -> Vec<PathBuf> {
    let mut entries = match tokio::fs::read_dir(index_root).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!("No registry index at {}: {}", index_root.display(), e);
            return Vec::new();
        }
    };

    let mut dirs = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let index = entry.path();
                let is_dir = matches!(entry.file_type().await, Ok(kind) if kind.is_dir());
                if !is_dir || !exists(&index.join(GIT_MARKER)).await {
                    continue;
                }
                let cache = index.join(INDEX_CACHE_DIR);
                if exists(&cache).await {
                    dirs.push(cache);
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Stopped scanning {}: {}", index_root.display(), e);
                break;
            }
        }
    }

    dirs.sort();
    dirs
}

async fn prune_target(target: &Path) -> PruneReport {
    let mut candidates = Vec::new();
    for dir in DISPOSABLE_TARGET_DIRS {
        let path = target.join(dir);
        if exists(&path).await {
            candidates.push(path);
        }
    }

    let root = target.to_path_buf();
    match tokio::task::spawn_blocking(move || dep_info_files(&root)).await {
        Ok(files) => candidates.extend(files),
        Err(e) => {
            let mut report = remove_all(candidates).await;
            report.fail(target, format!("scanning for dep-info files: {e}"));
            return report;
        }
    }

    remove_all(candidates).await
}

async fn exists(path: &Path) -> bool {
    matches!(tokio::fs::try_exists(path).await, Ok(true))
}

/// Dep-info files under `target`, skipping directories removed wholesale
fn dep_info_files(target: &Path) -> Vec<PathBuf> {
    WalkDir::new(target)
        .into_iter()
        .filter_entry(|entry| {
            !(entry.depth() == 1
                && entry.file_type().is_dir()
                && DISPOSABLE_TARGET_DIRS
                    .iter()
                    .any(|dir| entry.file_name() == *dir))
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| {
            entry.file_type().is_file()
                && entry.file_name().to_string_lossy().ends_with(DEP_INFO_SUFFIX)
        })
        .map(|entry| entry.into_path())
        .collect()
}

/// Delete every path concurrently, collecting outcomes
async fn remove_all(paths: Vec<PathBuf>) -> PruneReport {
    let deletions = paths.into_iter().map(|path| async move {
        let result = remove_path(&path).await;
        (path, result)
    });

    let mut report = PruneReport::default();
    for (path, result) in join_all(deletions).await {
        match result {
            Ok(()) => report.removed.push(path),
            Err(e) => report.fail(&path, e.to_string()),
        }
    }
    report
}

/// Remove a file or directory tree; already-gone counts as success
async fn remove_path(path: &Path) -> std::io::Result<()> {
    debug!("Deleting {}", path.display());

    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    let result = if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    match result {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
