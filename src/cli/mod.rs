//! Command-line interface

pub mod args;
pub mod commands;

pub use args::{CacheOptions, Cli, Commands, OutputFormat};
