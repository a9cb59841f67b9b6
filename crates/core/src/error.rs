//! Error types shared across the workspace.
//!
//! Domain crates keep their own error enums and convert into
//! [`DepGraphError`] at the binary boundary with `?`.

/// Top-level depgraph error
#[derive(Debug, thiserror::Error)]
pub enum DepGraphError {
    /// Configuration problem
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Crawl-level failure that aborts the run
    #[error("crawl error: {0}")]
    Crawl(#[from] CrawlFailure),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file does not exist
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// TOML could not be parsed
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// A field holds an out-of-range or unknown value
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Fatal crawl failures surfaced to the caller.
///
/// Per-package failures are never represented here; they are recorded on the
/// graph node instead.
#[derive(Debug, thiserror::Error)]
pub enum CrawlFailure {
    /// The crawl did not converge within the iteration budget
    #[error("crawl did not converge after {iterations} iterations")]
    Looping { iterations: u32 },

    /// The seed list could not be read or decoded
    #[error("seed list unavailable: {0}")]
    SeedList(String),

    /// The persisted graph could not be read or written
    #[error("graph snapshot error: {0}")]
    Snapshot(String),

    /// Graph invariant violated
    #[error("corrupt graph: {0}")]
    CorruptGraph(String),

    /// Anything else raised by the crawler
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "crawler.max_iterations".to_owned(),
            reason: "must be 1-10000".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("crawler.max_iterations"));
        assert!(msg.contains("must be 1-10000"));
    }

    #[test]
    fn looping_display_mentions_iterations() {
        let err = CrawlFailure::Looping { iterations: 100 };
        assert!(err.to_string().contains("100"));
    }

    #[test]
    fn converts_config_error() {
        let err: DepGraphError = ConfigError::ParseFailed {
            reason: "bad".to_owned(),
        }
        .into();
        assert!(matches!(
            err,
            DepGraphError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn converts_crawl_failure() {
        let err: DepGraphError = CrawlFailure::SeedList("404".to_owned()).into();
        assert!(matches!(err, DepGraphError::Crawl(CrawlFailure::SeedList(_))));
        assert!(err.to_string().contains("404"));
    }
}
