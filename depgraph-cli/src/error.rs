//! CLI-specific error types and exit code mapping

use depgraph_core::error::{CrawlFailure, DepGraphError};
use depgraph_crawler::CrawlError;

/// CLI-specific error type.
///
/// Per-package resolution failures never reach this type; they are recorded
/// on the graph.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// The crawl did not converge within its iteration budget.
    #[error("{0}")]
    NotConverged(String),

    /// Any other command failure (seed list, snapshot, graph).
    #[error("{0}")]
    Command(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from depgraph-core.
    #[error("{0}")]
    Core(#[from] DepGraphError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                       |
    /// |------|-------------------------------|
    /// | 0    | Success                       |
    /// | 1    | General / command error       |
    /// | 2    | Configuration error           |
    /// | 4    | Crawl did not converge        |
    /// | 10   | IO error                      |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::NotConverged(_) => 4,
            Self::Io(_) => 10,
            Self::Core(DepGraphError::Config(_)) => 2,
            Self::Core(DepGraphError::Crawl(CrawlFailure::Looping { .. })) => 4,
            Self::Core(DepGraphError::Io(_)) => 10,
            Self::Core(_) | Self::Command(_) | Self::JsonSerialize(_) => 1,
        }
    }
}

impl From<CrawlError> for CliError {
    fn from(e: CrawlError) -> Self {
        match e {
            CrawlError::Looping { .. } => Self::NotConverged(e.to_string()),
            CrawlError::Config { .. } => Self::Config(e.to_string()),
            CrawlError::Io { source, .. } => Self::Io(source),
            other => Self::Command(other.to_string()),
        }
    }
}
