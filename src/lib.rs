//! Rustcargo - Rust build caching for CI pipelines
//!
//! Extracts the toolchain identity, derives deterministic cache keys and
//! restores/saves the Cargo registry and build output through a remote
//! cache service.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod outputs;
pub mod process;
pub mod state;
pub mod toolchain;

pub use error::{RustcargoError, RustcargoResult};
