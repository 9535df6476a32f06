//! Rustcargo - Rust build caching for CI
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use rustcargo::cli::{commands, Cli, Commands};
use rustcargo::config::{ConfigManager, Overrides, Settings};
use rustcargo::error::RustcargoResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> RustcargoResult<()> {
    let cli = Cli::parse();

    // 0 = info, 1 = debug, 2+ = trace; RUST_LOG wins when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("rustcargo=info"),
        1 => EnvFilter::new("rustcargo=debug"),
        _ => EnvFilter::new("rustcargo=trace"),
    });

    // Step outputs may go to stdout, so logs stay on stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    debug!("Using config file {}", config_manager.path().display());

    let config = config_manager.load().await?;
    let overrides = Overrides::from(cli.command.cache_options().clone());
    let settings = Settings::resolve(&config, overrides)?;
    debug!("Resolved settings: {:?}", settings);

    match cli.command {
        Commands::Identify(args) => commands::identify(args, &settings).await,
        Commands::Restore(args) => commands::restore(args, &settings).await,
        Commands::Save(_) => commands::save(&settings).await,
        Commands::Key(args) => commands::key(args, &settings).await,
        Commands::Prune(_) => commands::prune(&settings).await,
    }
}
