//! Key command - show the cache key without contacting the service

use crate::cache::{CacheLifecycle, MemoryCacheService, PhasePlan};
use crate::cli::args::{KeyArgs, OutputFormat};
use crate::config::Settings;
use crate::error::RustcargoResult;
use crate::process::SystemRunner;
use crate::state::FilePhaseState;
use console::style;
use serde::Serialize;

#[derive(Serialize)]
struct KeyReport<'a> {
    key: &'a str,
    restore_prefixes: &'a [String],
    rust_version: &'a str,
    rust_hash: &'a str,
    paths: Vec<PathReport>,
}

#[derive(Serialize)]
struct PathReport {
    kind: String,
    path: String,
    exists: bool,
}

/// Execute the key command
pub async fn execute(args: KeyArgs, settings: &Settings) -> RustcargoResult<()> {
    let runner = SystemRunner::new();
    let state = FilePhaseState::new(settings.state_file.clone());
    // Planning never reaches the service
    let service = MemoryCacheService::new();

    let plan = CacheLifecycle::new(settings, &service, &state, &runner)
        .plan()
        .await?;

    match args.format {
        OutputFormat::Plain => println!("{}", plan.key.key),
        OutputFormat::Json => print_json(&plan).await?,
        OutputFormat::Table => print_table(&plan).await,
    }

    Ok(())
}

async fn path_reports(plan: &PhasePlan) -> Vec<PathReport> {
    let existing = plan.paths.existing().await;
    plan.paths
        .iter()
        .map(|entry| PathReport {
            kind: entry.kind.to_string(),
            path: entry.path.display().to_string(),
            exists: existing.iter().any(|e| e.path == entry.path),
        })
        .collect()
}

async fn print_json(plan: &PhasePlan) -> RustcargoResult<()> {
    let report = KeyReport {
        key: plan.key.key.as_str(),
        restore_prefixes: plan.key.prefixes.as_slice(),
        rust_version: &plan.identity.version,
        rust_hash: &plan.identity.commit_hash,
        paths: path_reports(plan).await,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn print_table(plan: &PhasePlan) {
    println!("{}", style("Cache Key").bold().cyan());
    println!();
    println!("  {:<14} {}", style("Key:").bold(), plan.key.key);
    for prefix in plan.key.prefixes.iter() {
        println!("  {:<14} {}", style("Fallback:").bold(), prefix);
    }
    println!(
        "  {:<14} {} ({})",
        style("Toolchain:").bold(),
        or_unknown(&plan.identity.version),
        or_unknown(&plan.identity.commit_hash)
    );

    println!();
    println!("{}", style("Paths").bold().cyan());
    println!();
    for path in path_reports(plan).await {
        let marker = if path.exists {
            style("✓").green()
        } else {
            style("-").dim()
        };
        println!("  {} {:<9} {}", marker, path.kind, path.path);
    }
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() {
        "unknown"
    } else {
        value
    }
}
