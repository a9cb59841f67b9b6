//! depgraph -- crawl a package registry into a dependency graph.

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::process::ExitCode;

use clap::Parser;

use crate::cli::Cli;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match commands::crawl::load_config(&cli).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return exit_code(e.exit_code());
        }
    };

    if let Err(e) = logging::init_tracing(&config.general) {
        eprintln!("error: {e}");
        return ExitCode::from(2);
    }

    tracing::info!(
        output = %config.crawler.output_path,
        seed = %config.crawler.seed_source,
        "depgraph starting"
    );

    let writer = OutputWriter::new(cli.format);
    match commands::crawl::execute(&cli, &config, &writer).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "crawl failed");
            eprintln!("error: {e}");
            exit_code(e.exit_code())
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
