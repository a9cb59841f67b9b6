//! `depgraph` crawl handler

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use depgraph_core::config::DepGraphConfig;
use depgraph_crawler::{CrawlSummary, Crawler, CrawlerConfig, GraphSnapshot, GraphStore};

use crate::cli::Cli;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

const DEFAULT_CONFIG_PATH: &str = "depgraph.toml";

/// Loads the configuration and applies command-line overrides.
///
/// An explicit `--config` must exist; otherwise `depgraph.toml` is used when
/// present and defaults (plus env overrides) when not.
pub async fn load_config(cli: &Cli) -> Result<DepGraphConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => DepGraphConfig::load(path).await?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            DepGraphConfig::load(DEFAULT_CONFIG_PATH).await?
        }
        None => DepGraphConfig::from_env()?,
    };

    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(output) = &cli.output {
        config.crawler.output_path = output.display().to_string();
    }
    if let Some(seed) = &cli.seed {
        config.crawler.seed_source = seed.clone();
    }
    if let Some(max) = cli.max_iterations {
        config.crawler.max_iterations = max;
    }

    config.validate()?;
    Ok(config)
}

/// Execute the crawl.
pub async fn execute(
    cli: &Cli,
    config: &DepGraphConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let crawler_config = CrawlerConfig::from_core(&config.crawler)?;
    let output = PathBuf::from(&crawler_config.output_path);

    let prepared = prepare_store(
        &output,
        cli.rebuild_all,
        cli.rebuild.as_deref(),
        crawler_config.forge_domains.clone(),
    )
    .await?;

    let crawler = Crawler::from_config(crawler_config, Arc::new(prepared.store))?;
    let summary = crawler.run().await?;

    GraphSnapshot::from_store(crawler.store())
        .save(&output)
        .await?;

    let report = CrawlReport::new(&output, cli.rebuild.clone(), prepared.removed, &summary);
    writer.render(&report)?;
    Ok(())
}

/// Graph the crawl starts from.
pub struct PreparedStore {
    /// Starting graph
    pub store: GraphStore,
    /// Nodes dropped by the rebuild filter
    pub removed: usize,
}

/// Builds the starting graph.
///
/// `--rebuild-all` or a missing file gives an empty graph; otherwise the
/// persisted graph is loaded and the rebuild filter, if any, is applied.
pub async fn prepare_store(
    output: &Path,
    rebuild_all: bool,
    rebuild: Option<&str>,
    forge_domains: Vec<String>,
) -> Result<PreparedStore, CliError> {
    if rebuild_all || !output.exists() {
        info!(path = %output.display(), rebuild_all, "starting from an empty graph");
        return Ok(PreparedStore {
            store: GraphStore::new(forge_domains),
            removed: 0,
        });
    }

    let store = GraphSnapshot::load(output).await?.into_store(forge_domains);

    let removed = match rebuild {
        Some(filter) => {
            let removed = store.remove_by_filter(filter)?;
            info!(filter, removed = removed.len(), "invalidated matching packages");
            removed.len()
        }
        None => 0,
    };

    Ok(PreparedStore { store, removed })
}

/// Crawl outcome as printed to the user.
#[derive(Debug, Serialize)]
pub struct CrawlReport {
    pub output: String,
    pub rebuild_filter: Option<String>,
    pub removed: usize,
    pub iterations: u32,
    pub nodes: usize,
    pub failed: usize,
    pub elapsed_secs: f64,
}

impl CrawlReport {
    fn new(
        output: &Path,
        rebuild_filter: Option<String>,
        removed: usize,
        summary: &CrawlSummary,
    ) -> Self {
        Self {
            output: output.display().to_string(),
            rebuild_filter,
            removed,
            iterations: summary.iterations,
            nodes: summary.nodes,
            failed: summary.failed,
            elapsed_secs: summary.elapsed.as_secs_f64(),
        }
    }
}

impl Render for CrawlReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(filter) = &self.rebuild_filter {
            writeln!(w, "Rebuild filter '{}': {} nodes invalidated", filter, self.removed)?;
        }
        writeln!(w, "Graph: {}", self.output.bold())?;
        writeln!(w, "Iterations: {}", self.iterations)?;
        writeln!(w, "Packages: {}", self.nodes)?;

        let failed = format!("{}", self.failed);
        if self.failed > 0 {
            writeln!(w, "Failed: {}", failed.yellow())?;
        } else {
            writeln!(w, "Failed: {}", failed.green())?;
        }

        writeln!(w, "Elapsed: {:.2}s", self.elapsed_secs)?;
        Ok(())
    }
}
