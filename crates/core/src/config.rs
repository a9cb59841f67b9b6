//! Configuration management -- `depgraph.toml` parsing and runtime settings
//!
//! [`DepGraphConfig`] is the top-level structure holding every section.
//!
//! # Loading precedence
//! 1. CLI arguments (highest)
//! 2. Environment variables (`DEPGRAPH_CRAWLER_MAX_ITERATIONS=50` form)
//! 3. Config file (`depgraph.toml`)
//! 4. Defaults (`Default` impls)
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), depgraph_core::error::DepGraphError> {
//! use depgraph_core::config::DepGraphConfig;
//!
//! // file + env overrides
//! let config = DepGraphConfig::load("depgraph.toml").await?;
//!
//! // straight from a TOML string
//! let config = DepGraphConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, DepGraphError};

/// Upper bound on the crawl iteration budget.
const MAX_ITERATIONS_LIMIT: u32 = 10_000;
/// Upper bound on any per-request deadline.
const MAX_TIMEOUT_SECS: u64 = 300;
/// Upper bound on chained redirects.
const MAX_REDIRECTS_LIMIT: u32 = 50;

/// Integrated depgraph configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepGraphConfig {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,
    /// Crawler settings
    #[serde(default)]
    pub crawler: CrawlerSection,
}

impl DepGraphConfig {
    /// Loads the TOML file, applies env overrides and validates.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DepGraphError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus env overrides, used when no config file is present.
    pub fn from_env() -> Result<Self, DepGraphError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads the TOML file without env overrides.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DepGraphError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DepGraphError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                DepGraphError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, DepGraphError> {
        toml::from_str(toml_str).map_err(|e| {
            DepGraphError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// Overrides values from environment variables.
    ///
    /// Naming rule: `DEPGRAPH_{SECTION}_{FIELD}`, e.g. `DEPGRAPH_GENERAL_LOG_LEVEL=debug`.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "DEPGRAPH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "DEPGRAPH_GENERAL_LOG_FORMAT");

        // Crawler
        override_string(&mut self.crawler.seed_source, "DEPGRAPH_CRAWLER_SEED_SOURCE");
        override_string(
            &mut self.crawler.self_identity,
            "DEPGRAPH_CRAWLER_SELF_IDENTITY",
        );
        override_string(&mut self.crawler.output_path, "DEPGRAPH_CRAWLER_OUTPUT_PATH");
        override_u32(
            &mut self.crawler.max_iterations,
            "DEPGRAPH_CRAWLER_MAX_ITERATIONS",
        );
        override_usize(&mut self.crawler.concurrency, "DEPGRAPH_CRAWLER_CONCURRENCY");
        override_u64(
            &mut self.crawler.fetch_timeout_secs,
            "DEPGRAPH_CRAWLER_FETCH_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.crawler.git_timeout_secs,
            "DEPGRAPH_CRAWLER_GIT_TIMEOUT_SECS",
        );
        override_u32(
            &mut self.crawler.max_redirects,
            "DEPGRAPH_CRAWLER_MAX_REDIRECTS",
        );
        override_csv(
            &mut self.crawler.forge_domains,
            "DEPGRAPH_CRAWLER_FORGE_DOMAINS",
        );
        override_string(&mut self.crawler.ref_strategy, "DEPGRAPH_CRAWLER_REF_STRATEGY");
        override_string(
            &mut self.crawler.min_tools_version,
            "DEPGRAPH_CRAWLER_MIN_TOOLS_VERSION",
        );
        override_string(
            &mut self.crawler.max_tools_version,
            "DEPGRAPH_CRAWLER_MAX_TOOLS_VERSION",
        );
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), DepGraphError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        self.crawler.validate()
    }
}

/// `[general]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log format (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// `[crawler]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerSection {
    /// Seed list location: `http(s)://` URL or local path to a JSON array of references
    pub seed_source: String,
    /// The crawler's own package reference, appended to the seed list when non-empty
    pub self_identity: String,
    /// Where the persisted graph is written
    pub output_path: String,
    /// Iteration budget before the crawl aborts with `Looping`
    pub max_iterations: u32,
    /// Parallel resolutions per batch (0 = available cores)
    pub concurrency: usize,
    /// HTTP request deadline
    pub fetch_timeout_secs: u64,
    /// Deadline for each remote ref/tag query
    pub git_timeout_secs: u64,
    /// Maximum chained redirect hops
    pub max_redirects: u32,
    /// Recognised code-hosting hosts
    pub forge_domains: Vec<String>,
    /// Which ref to read manifests from (default-branch, latest-tag)
    pub ref_strategy: String,
    /// Manifest format floor; older declarations are clamped up to it
    pub min_tools_version: String,
    /// Newest manifest format the interpreter understands
    pub max_tools_version: String,
}

impl Default for CrawlerSection {
    fn default() -> Self {
        Self {
            seed_source:
                "https://raw.githubusercontent.com/daveverwer/SwiftPMLibrary/master/packages.json"
                    .to_owned(),
            self_identity: String::new(),
            output_path: "dependencies.json".to_owned(),
            max_iterations: 100,
            concurrency: 0,
            fetch_timeout_secs: 5,
            git_timeout_secs: 5,
            max_redirects: 10,
            forge_domains: vec![
                "github.com".to_owned(),
                "gitlab.com".to_owned(),
                "bitbucket.org".to_owned(),
            ],
            ref_strategy: "default-branch".to_owned(),
            min_tools_version: "4.0.0".to_owned(),
            max_tools_version: "5.10.0".to_owned(),
        }
    }
}

impl CrawlerSection {
    /// Validates the crawler section.
    ///
    /// Tools versions are only checked for presence here; the crawler crate
    /// parses them when it builds its own config.
    pub fn validate(&self) -> Result<(), DepGraphError> {
        if self.seed_source.trim().is_empty() {
            return Err(invalid("crawler.seed_source", "must not be empty"));
        }

        if self.output_path.trim().is_empty() {
            return Err(invalid("crawler.output_path", "must not be empty"));
        }

        if self.max_iterations == 0 || self.max_iterations > MAX_ITERATIONS_LIMIT {
            return Err(invalid(
                "crawler.max_iterations",
                &format!("must be 1-{MAX_ITERATIONS_LIMIT}"),
            ));
        }

        if self.fetch_timeout_secs == 0 || self.fetch_timeout_secs > MAX_TIMEOUT_SECS {
            return Err(invalid(
                "crawler.fetch_timeout_secs",
                &format!("must be 1-{MAX_TIMEOUT_SECS}"),
            ));
        }

        if self.git_timeout_secs == 0 || self.git_timeout_secs > MAX_TIMEOUT_SECS {
            return Err(invalid(
                "crawler.git_timeout_secs",
                &format!("must be 1-{MAX_TIMEOUT_SECS}"),
            ));
        }

        if self.max_redirects == 0 || self.max_redirects > MAX_REDIRECTS_LIMIT {
            return Err(invalid(
                "crawler.max_redirects",
                &format!("must be 1-{MAX_REDIRECTS_LIMIT}"),
            ));
        }

        if self.forge_domains.is_empty() || self.forge_domains.iter().any(|d| d.is_empty()) {
            return Err(invalid(
                "crawler.forge_domains",
                "at least one non-empty domain required",
            ));
        }

        let valid_strategies = ["default-branch", "latest-tag"];
        if !valid_strategies.contains(&self.ref_strategy.as_str()) {
            return Err(invalid(
                "crawler.ref_strategy",
                &format!("must be one of: {}", valid_strategies.join(", ")),
            ));
        }

        if self.min_tools_version.is_empty() || self.max_tools_version.is_empty() {
            return Err(invalid(
                "crawler.min_tools_version",
                "tools versions must not be empty",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> DepGraphError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
    .into()
}

// --- env override helpers ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
