//! Build cache for Rust CI runs
//!
//! Caches the Cargo registry and compiled artifacts between pipeline runs,
//! keyed by toolchain identity and lockfile contents.
//!
//! # Key Layout
//!
//! | Part | Example |
//! |------|---------|
//! | namespace | `setup-rustcargo` |
//! | schema version | `v1` |
//! | platform | `linux` |
//! | digest | SHA-1 hex of the ordered key inputs |
//!
//! Fallback prefixes drop the digest, then the platform, so a miss on the
//! exact key can still restore the closest earlier cache.

pub mod key;
pub mod lifecycle;
pub mod paths;
pub mod prune;
pub mod service;

pub use key::{derive_key, CacheKey, CacheKeyPrefixes, KeyInputs, KeyPlan, KeySchema, KeyStrategy};
pub use lifecycle::{CacheLifecycle, CacheOutcome, PhasePlan, SaveOutcome};
pub use paths::{resolve_cache_paths, CachePath, CachePathKind, CachePathSet};
pub use prune::{PruneReport, Pruner};
pub use service::{CacheService, CommandCacheService, MemoryCacheService};
