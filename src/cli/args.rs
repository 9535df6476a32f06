//! CLI argument definitions using clap derive

use crate::config::Overrides;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Rustcargo - Rust build caching for CI
///
/// Restores and saves the Cargo registry and target directory around a
/// CI build, keyed by toolchain identity and lockfile contents.
#[derive(Parser, Debug)]
#[command(name = "rustcargo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "RUSTCARGO_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record the toolchain version and commit hash
    Identify(IdentifyArgs),

    /// Restore the build cache before compiling
    Restore(RestoreArgs),

    /// Prune and save the build cache after compiling
    Save(CacheOptions),

    /// Show the cache key, fallbacks and paths without contacting the service
    Key(KeyArgs),

    /// Prune existing cache paths without saving
    Prune(CacheOptions),
}

/// Arguments for the identify command
#[derive(Args, Debug)]
pub struct IdentifyArgs {
    /// Toolchain channel to query (e.g. stable, nightly, 1.75.0)
    #[arg(short, long, default_value = "stable", env = "RUSTCARGO_TOOLCHAIN")]
    pub toolchain: String,

    #[command(flatten)]
    pub cache: CacheOptions,
}

/// Arguments for the restore command
#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Extract the toolchain identity first, replacing any recorded one
    #[arg(short, long)]
    pub toolchain: Option<String>,

    #[command(flatten)]
    pub cache: CacheOptions,
}

/// Arguments for the key command
#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Output format
    #[arg(short, long, default_value = "plain")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub cache: CacheOptions,
}

/// Output format for the key command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Table,
    /// JSON output
    Json,
    /// Primary key only
    Plain,
}

/// Options shared by every cache-aware command
#[derive(Args, Debug, Clone, Default)]
pub struct CacheOptions {
    /// Enable or disable caching
    #[arg(long = "cache", env = "RUSTCARGO_CACHE", value_parser = BoolishValueParser::new())]
    pub cache_enabled: Option<bool>,

    /// Build profile directory to cache (debug, release, ...)
    #[arg(long, env = "RUSTCARGO_CACHE_TARGET")]
    pub target_profile: Option<String>,

    /// Comma-separated build output roots, relative to the workspace
    #[arg(long, env = "RUSTCARGO_TARGET_DIRS")]
    pub target_dirs: Option<String>,

    /// Extra key discriminator for parallel jobs
    #[arg(long, env = "RUSTCARGO_JOB_ID")]
    pub job_id: Option<String>,

    /// Use the loosened warm-up key for cache warming runs
    #[arg(long, env = "RUSTCARGO_CACHE_BASE")]
    pub cache_base: Option<String>,

    /// Base branch of the change under test
    #[arg(long, env = "GITHUB_BASE_REF")]
    pub base_ref: Option<String>,

    /// Workspace root (defaults to current directory)
    #[arg(short, long, env = "GITHUB_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Cargo home directory
    #[arg(long, env = "CARGO_HOME")]
    pub cargo_home: Option<PathBuf>,

    /// File carrying state between the restore and save phases
    #[arg(long, env = "RUSTCARGO_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// File receiving step outputs (stdout when unset)
    #[arg(long, env = "GITHUB_OUTPUT")]
    pub output_file: Option<PathBuf>,

    /// Helper program bound to the remote cache service
    #[arg(long, env = "RUSTCARGO_CACHE_COMMAND")]
    pub cache_command: Option<String>,

    /// CI run identifier; keeps state from different runs apart
    #[arg(long, env = "GITHUB_RUN_ID")]
    pub run_id: Option<String>,

    /// Attempt number of the CI run
    #[arg(long, env = "GITHUB_RUN_ATTEMPT")]
    pub run_attempt: Option<String>,
}

impl From<CacheOptions> for Overrides {
    fn from(opts: CacheOptions) -> Self {
        Overrides {
            cache_enabled: opts.cache_enabled,
            target_profile: opts.target_profile,
            target_dirs: opts.target_dirs,
            job_id: opts.job_id,
            cache_base: opts.cache_base,
            base_ref: opts.base_ref,
            workspace: opts.workspace,
            cargo_home: opts.cargo_home,
            state_file: opts.state_file,
            output_file: opts.output_file,
            cache_command: opts.cache_command,
            run_id: opts.run_id,
            run_attempt: opts.run_attempt,
        }
    }
}

impl Commands {
    /// Shared cache options of whichever command was chosen
    pub fn cache_options(&self) -> &CacheOptions {
        match self {
            Commands::Identify(args) => &args.cache,
            Commands::Restore(args) => &args.cache,
            Commands::Key(args) => &args.cache,
            Commands::Save(opts) | Commands::Prune(opts) => opts,
        }
    }
}
