//! Cache key derivation
//!
//! A key is `<namespace>-v<N>-<platform>-<sha1 hex>`. The digest input order
//! is part of the key contract: changing it (or any input encoding)
//! orphans every cache saved by earlier releases. Bump
//! [`KEY_SCHEMA_VERSION`] whenever the scheme changes on purpose.

use crate::error::{RustcargoError, RustcargoResult};
use crate::toolchain::ToolchainIdentity;
use sha1::{Digest, Sha1};
use sha2::Sha256;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Namespace shared by every key this tool saves
pub const KEY_NAMESPACE: &str = "setup-rustcargo";

/// Key scheme version; bumping it invalidates all saved caches
pub const KEY_SCHEMA_VERSION: u32 = 1;

/// Literal fed in place of the lockfile for warm-up keys
const WARMUP_MARKER: &str = "warmup";

/// Namespace, scheme version and platform of generated keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    namespace: String,
    version: u32,
    platform: String,
}

impl KeySchema {
    pub fn new(namespace: impl Into<String>, version: u32, platform: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            version,
            platform: platform.into(),
        }
    }

    /// Schema for this build running on this OS
    pub fn current() -> Self {
        Self::new(KEY_NAMESPACE, KEY_SCHEMA_VERSION, std::env::consts::OS)
    }

    /// `<namespace>-v<N>`
    pub fn versioned_prefix(&self) -> String {
        format!("{}-v{}", self.namespace, self.version)
    }

    /// `<namespace>-v<N>-<platform>`
    pub fn platform_prefix(&self) -> String {
        format!("{}-{}", self.versioned_prefix(), self.platform)
    }

    /// Restore fallbacks, most specific first
    pub fn prefixes(&self) -> CacheKeyPrefixes {
        CacheKeyPrefixes(vec![self.platform_prefix(), self.versioned_prefix()])
    }

    pub(crate) fn key(&self, digest: &str) -> CacheKey {
        CacheKey(format!("{}-{}", self.platform_prefix(), digest))
    }
}

impl Default for KeySchema {
    fn default() -> Self {
        Self::current()
    }
}

/// Opaque cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for CacheKey {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Restore-time fallback prefixes, never used for saving
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeyPrefixes(Vec<String>);

impl CacheKeyPrefixes {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    /// The most specific prefix
    pub fn most_specific(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }
}

/// How the digest is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Lockfile contents plus optional job discriminator
    Exact {
        lockfile: PathBuf,
        job_discriminator: Option<String>,
    },
    /// Loosened key for cache warming runs: no lockfile, no job
    Warmup { base_ref: Option<String> },
}

/// Everything a key is derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInputs {
    pub identity: ToolchainIdentity,
    pub target_profile: String,
    pub strategy: KeyStrategy,
}

/// A derived key and its fallbacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPlan {
    pub key: CacheKey,
    pub prefixes: CacheKeyPrefixes,
}

/// Hex SHA-256 of a lockfile's bytes.
///
/// A missing lockfile hashes like an empty one; some workspaces (libraries)
/// do not commit one.
pub async fn hash_lockfile(path: &Path) -> RustcargoResult<String> {
    let contents = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Lockfile {} not found, hashing empty input", path.display());
            Vec::new()
        }
        Err(e) => {
            return Err(RustcargoError::io(
                format!("reading lockfile {}", path.display()),
                e,
            ))
        }
    };

    Ok(hex::encode(Sha256::digest(&contents)))
}

/// Digest for the default strategy.
///
/// Feeds, in order: version, commit hash, lockfile hash, target profile,
/// and the job discriminator only when one is set.
pub fn exact_digest(
    identity: &ToolchainIdentity,
    lockfile_hash: &str,
    target_profile: &str,
    job_discriminator: Option<&str>,
) -> String {
    let mut hasher = Sha1::new();

    debug!("Hashing toolchain version = {}", identity.version);
    hasher.update(identity.version.as_bytes());

    debug!("Hashing toolchain commit hash = {}", identity.commit_hash);
    hasher.update(identity.commit_hash.as_bytes());

    debug!("Hashing lockfile = {}", lockfile_hash);
    hasher.update(lockfile_hash.as_bytes());

    debug!("Hashing target profile = {}", target_profile);
    hasher.update(target_profile.as_bytes());

    if let Some(job) = job_discriminator {
        debug!("Hashing job discriminator = {}", job);
        hasher.update(job.as_bytes());
    }

    hex::encode(hasher.finalize())
}

/// Digest for warm-up runs.
///
/// Feeds version, commit hash, target profile, the warm-up marker, then the
/// base ref when it names a long-lived branch.
pub fn warmup_digest(
    identity: &ToolchainIdentity,
    base_ref: Option<&str>,
    target_profile: &str,
) -> String {
    let mut hasher = Sha1::new();

    hasher.update(identity.version.as_bytes());
    hasher.update(identity.commit_hash.as_bytes());

    debug!("Hashing target profile = {}", target_profile);
    hasher.update(target_profile.as_bytes());

    debug!("Using warm-up strategy, not hashing lockfile or job");
    hasher.update(WARMUP_MARKER.as_bytes());

    if let Some(base) = base_ref.filter(|base| is_long_lived_branch(base)) {
        debug!("Hashing base ref = {}", base);
        hasher.update(base.as_bytes());
    }

    hex::encode(hasher.finalize())
}

/// Branches whose warm-up caches are worth sharing
pub fn is_long_lived_branch(name: &str) -> bool {
    matches!(name, "master" | "main" | "trunk")
        || name.starts_with("develop")
        || name.starts_with("release")
}

/// Derive the primary key and fallback prefixes.
///
/// Pure apart from reading the lockfile: identical inputs give a
/// byte-identical key on any machine.
pub async fn derive_key(schema: &KeySchema, inputs: &KeyInputs) -> RustcargoResult<KeyPlan> {
    info!("Generating cache key");

    let digest = match &inputs.strategy {
        KeyStrategy::Exact {
            lockfile,
            job_discriminator,
        } => {
            let lockfile_hash = hash_lockfile(lockfile).await?;
            exact_digest(
                &inputs.identity,
                &lockfile_hash,
                &inputs.target_profile,
                job_discriminator.as_deref(),
            )
        }
        KeyStrategy::Warmup { base_ref } => warmup_digest(
            &inputs.identity,
            base_ref.as_deref(),
            &inputs.target_profile,
        ),
    };

    Ok(KeyPlan {
        key: schema.key(&digest),
        prefixes: schema.prefixes(),
    })
}
