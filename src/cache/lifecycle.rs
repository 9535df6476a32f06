//! Cache lifecycle orchestration
//!
//! Two independent entry points, each run in its own process:
//!
//! | Phase | Steps |
//! |-------|-------|
//! | restore | derive key, resolve paths, restore exact key then fallbacks, record hit |
//! | save | re-derive key, skip on exact hit or when nothing exists, prune, save |
//!
//! Recoverable service failures (see [`crate::error::RustcargoError::is_fatal`]) are
//! downgraded to warnings in both phases; configuration, toolchain and local
//! IO problems abort.

use super::key::{derive_key, KeyInputs, KeyPlan, KeySchema, KeyStrategy};
use super::paths::{resolve_cache_paths, CachePathSet};
use super::prune::{PruneReport, Pruner};
use super::service::CacheService;
use crate::config::Settings;
use crate::error::RustcargoResult;
use crate::process::ProcessRunner;
use crate::state::{keys, PhaseState};
use crate::toolchain::ToolchainIdentity;
use serde::Serialize;
use tracing::{info, warn};

/// Lockfile hashed into exact keys, relative to the workspace root
pub const LOCKFILE_NAME: &str = "Cargo.lock";

/// Result of the restore phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheOutcome {
    /// Matched key on a hit, otherwise the primary key that will be saved
    pub key: String,
    pub hit: bool,
}

/// Result of the save phase
#[derive(Debug, Clone)]
pub enum SaveOutcome {
    /// Caching is off or the service is unavailable
    Disabled,
    /// The exact key was restored, so the content is already saved
    SkippedExactHit { key: String },
    /// None of the cache roots exist
    SkippedNoPaths { key: String },
    /// Saved under `key`
    Saved { key: String, prune: PruneReport },
    /// The service rejected the save; the run continues
    Failed { key: String, reason: String },
}

impl SaveOutcome {
    /// Whether a save request reached the service
    pub fn attempted(&self) -> bool {
        matches!(self, Self::Saved { .. } | Self::Failed { .. })
    }
}

/// Key and paths computed once per phase invocation
#[derive(Debug, Clone)]
pub struct PhasePlan {
    pub identity: ToolchainIdentity,
    pub key: KeyPlan,
    pub paths: CachePathSet,
}

/// Sequences restore and save against the remote cache
pub struct CacheLifecycle<'a> {
    settings: &'a Settings,
    schema: KeySchema,
    service: &'a dyn CacheService,
    state: &'a dyn PhaseState,
    runner: &'a dyn ProcessRunner,
}

impl<'a> CacheLifecycle<'a> {
    pub fn new(
        settings: &'a Settings,
        service: &'a dyn CacheService,
        state: &'a dyn PhaseState,
        runner: &'a dyn ProcessRunner,
    ) -> Self {
        Self {
            settings,
            schema: KeySchema::current(),
            service,
            state,
            runner,
        }
    }

    /// Use a specific key schema instead of the current platform's
    pub fn with_schema(mut self, schema: KeySchema) -> Self {
        self.schema = schema;
        self
    }

    async fn is_enabled(&self) -> bool {
        if !self.settings.cache_enabled {
            info!("Caching disabled by configuration");
            return false;
        }
        if !self.service.is_available().await {
            info!("Cache service unavailable, skipping");
            return false;
        }
        true
    }

    fn key_inputs(&self, identity: ToolchainIdentity) -> KeyInputs {
        let strategy = match &self.settings.cache_base {
            Some(_) => KeyStrategy::Warmup {
                base_ref: self.settings.base_ref.clone(),
            },
            None => KeyStrategy::Exact {
                lockfile: self.settings.workspace_root.join(LOCKFILE_NAME),
                job_discriminator: self.settings.job_discriminator.clone(),
            },
        };

        KeyInputs {
            identity,
            target_profile: self.settings.target_profile.clone(),
            strategy,
        }
    }

    /// Derive the key and resolve cache roots from persisted identity
    pub async fn plan(&self) -> RustcargoResult<PhasePlan> {
        let identity = ToolchainIdentity::load(self.state).await?;
        if identity.is_empty() {
            warn!("No toolchain identity recorded; keys will not track the compiler");
        }

        let key = derive_key(&self.schema, &self.key_inputs(identity.clone())).await?;
        let paths = resolve_cache_paths(
            &self.settings.workspace_root,
            &self.settings.cargo_home,
            &self.settings.target_profile,
            &self.settings.target_dirs,
        )?;

        Ok(PhasePlan {
            identity,
            key,
            paths,
        })
    }

    /// Restore phase. `None` when caching is disabled.
    pub async fn restore(&self) -> RustcargoResult<Option<CacheOutcome>> {
        if !self.is_enabled().await {
            return Ok(None);
        }

        info!("Attempting to restore cache");

        // Only a hit recorded by this restore may skip the save
        self.state.remove(keys::CACHE_HIT_KEY).await?;

        let plan = self.plan().await?;
        for entry in &plan.paths {
            info!("Cache path ({}): {}", entry.kind, entry.path.display());
        }

        let primary = &plan.key.key;
        let matched = match self
            .service
            .restore(&plan.paths, primary, &plan.key.prefixes)
            .await
        {
            Ok(matched) => matched,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Cache restore failed, continuing without cache: {}", e);
                None
            }
        };

        let outcome = match matched {
            Some(key) => {
                self.state.set(keys::CACHE_HIT_KEY, &key).await?;
                info!("Cache restored using key {}", key);
                CacheOutcome { key, hit: true }
            }
            None => {
                warn!("Cache does not exist using key {}", primary);
                CacheOutcome {
                    key: primary.to_string(),
                    hit: false,
                }
            }
        };

        Ok(Some(outcome))
    }

    /// Save phase
    pub async fn save(&self) -> RustcargoResult<SaveOutcome> {
        if !self.is_enabled().await {
            return Ok(SaveOutcome::Disabled);
        }

        let plan = self.plan().await?;
        let key = plan.key.key.to_string();

        if self.state.get(keys::CACHE_HIT_KEY).await?.as_deref() == Some(key.as_str()) {
            info!("Cache hit occurred on the key {}, not saving cache", key);
            return Ok(SaveOutcome::SkippedExactHit { key });
        }

        let existing = plan.paths.existing().await;
        if existing.is_empty() {
            info!("No cache paths exist on disk, not saving cache");
            return Ok(SaveOutcome::SkippedNoPaths { key });
        }

        let prune = Pruner::new(self.runner).prune(&existing).await;

        info!("Saving cache with key {}", key);
        match self.service.save(&existing, &plan.key.key).await {
            Ok(()) => Ok(SaveOutcome::Saved { key, prune }),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("Failed to save cache with key {}: {}", key, e);
                Ok(SaveOutcome::Failed {
                    key,
                    reason: e.to_string(),
                })
            }
        }
    }
}
