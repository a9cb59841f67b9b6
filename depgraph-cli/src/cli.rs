//! CLI argument parsing using clap derive API
//!
//! Purely declarative; no side effects or I/O.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// depgraph -- crawl a package registry into a dependency graph.
///
/// Loads the existing graph (unless `--rebuild-all`), resolves every package
/// that is new or was invalidated, and writes the graph back.
#[derive(Parser, Debug)]
#[command(name = "depgraph", version, about, long_about = None)]
pub struct Cli {
    /// Path to the depgraph.toml configuration file.
    ///
    /// Without this flag `depgraph.toml` is used when present, defaults otherwise.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Report format.
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Graph file to read and write (overrides `crawler.output_path`).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Ignore any existing graph and start empty.
    #[arg(long, conflicts_with = "rebuild")]
    pub rebuild_all: bool,

    /// Drop every node whose identity contains SUBSTRING, plus its dependents,
    /// before crawling.
    #[arg(long, value_name = "SUBSTRING")]
    pub rebuild: Option<String>,

    /// Seed list URL or path (overrides `crawler.seed_source`).
    #[arg(long)]
    pub seed: Option<String>,

    /// Iteration budget (overrides `crawler.max_iterations`).
    #[arg(long)]
    pub max_iterations: Option<u32>,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}
