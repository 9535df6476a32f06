//! Cache path resolution
//!
//! The cache is the Cargo registry plus one profile directory under each
//! configured build output root.

use crate::error::{RustcargoError, RustcargoResult};
use futures_util::future::join_all;
use std::fmt;
use std::path::{Path, PathBuf};

/// What a cached directory holds; drives how it is pruned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CachePathKind {
    /// `$CARGO_HOME/registry`
    Registry,
    /// `<workspace>/<target dir>/<profile>`
    Target,
}

impl fmt::Display for CachePathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry => write!(f, "registry"),
            Self::Target => write!(f, "target"),
        }
    }
}

/// One absolute cache root
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CachePath {
    pub kind: CachePathKind,
    pub path: PathBuf,
}

/// Ordered, duplicate-free set of cache roots.
///
/// Order is registry first, then targets in configuration order, so logs
/// and save requests are stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachePathSet {
    entries: Vec<CachePath>,
}

impl CachePathSet {
    fn push(&mut self, kind: CachePathKind, path: PathBuf) {
        if !self.entries.iter().any(|entry| entry.path == path) {
            self.entries.push(CachePath { kind, path });
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CachePath> {
        self.entries.iter()
    }

    /// Plain paths in set order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|entry| entry.path.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only roots that currently exist on disk, preserving order
    pub async fn existing(&self) -> Self {
        let checks = self
            .entries
            .iter()
            .map(|entry| tokio::fs::try_exists(&entry.path));
        let results = join_all(checks).await;

        let entries = self
            .entries
            .iter()
            .zip(results)
            .filter(|(_, exists)| matches!(exists, Ok(true)))
            .map(|(entry, _)| entry.clone())
            .collect();

        Self { entries }
    }
}

impl<'a> IntoIterator for &'a CachePathSet {
    type Item = &'a CachePath;
    type IntoIter = std::slice::Iter<'a, CachePath>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Registry root under the Cargo home
pub fn registry_dir(cargo_home: &Path) -> PathBuf {
    cargo_home.join("registry")
}

/// Compute the cache roots for a workspace.
///
/// `target_dirs` are relative build output roots; at least one is required.
/// Nothing is checked on disk here.
pub fn resolve_cache_paths(
    workspace_root: &Path,
    cargo_home: &Path,
    target_profile: &str,
    target_dirs: &[String],
) -> RustcargoResult<CachePathSet> {
    let dirs: Vec<&str> = target_dirs
        .iter()
        .map(|dir| dir.trim())
        .filter(|dir| !dir.is_empty())
        .collect();

    if dirs.is_empty() {
        return Err(RustcargoError::Config(
            "no target directories configured".to_string(),
        ));
    }

    let mut set = CachePathSet::default();
    set.push(CachePathKind::Registry, registry_dir(cargo_home));

    for dir in dirs {
        set.push(
            CachePathKind::Target,
            workspace_root.join(dir).join(target_profile),
        );
    }

    Ok(set)
}
