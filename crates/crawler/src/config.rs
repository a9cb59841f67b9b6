//! Crawler configuration
//!
//! [`CrawlerConfig`] is the typed form of the core `[crawler]` section:
//! durations instead of seconds, parsed tools versions, and an enum for the
//! ref strategy.
//!
//! # Example
//!
//! ```
//! use depgraph_crawler::{CrawlerConfigBuilder, RefStrategy};
//!
//! let config = CrawlerConfigBuilder::new()
//!     .seed_source("./packages.json")
//!     .max_iterations(20)
//!     .ref_strategy(RefStrategy::LatestTag)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.max_iterations, 20);
//! ```

use std::time::Duration;

use depgraph_core::config::CrawlerSection;

use crate::error::CrawlError;

/// Which git ref manifests are read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefStrategy {
    /// The remote's default branch
    #[default]
    DefaultBranch,
    /// The highest version tag, falling back to the default branch
    LatestTag,
}

impl RefStrategy {
    /// Parses `default-branch` / `latest-tag`.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default-branch" | "branch" => Some(Self::DefaultBranch),
            "latest-tag" | "tag" => Some(Self::LatestTag),
            _ => None,
        }
    }
}

/// Crawler settings
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Seed list URL or path
    pub seed_source: String,
    /// Extra seed appended to the list
    pub self_identity: Option<String>,
    /// Persisted graph path
    pub output_path: String,
    /// Iteration budget
    pub max_iterations: u32,
    /// Parallel resolutions per batch; 0 means available cores
    pub concurrency: usize,
    /// HTTP request deadline
    pub fetch_timeout: Duration,
    /// Per-query git deadline
    pub git_timeout: Duration,
    /// Redirects followed per fetch
    pub max_redirects: u32,
    /// Hosts accepted as repository forges
    pub forge_domains: Vec<String>,
    /// Manifest ref selection
    pub ref_strategy: RefStrategy,
    /// Oldest manifest format; older declarations are clamped up to it
    pub min_tools_version: semver::Version,
    /// Newest manifest format understood
    pub max_tools_version: semver::Version,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        let section = CrawlerSection::default();
        Self {
            seed_source: section.seed_source,
            self_identity: None,
            output_path: section.output_path,
            max_iterations: section.max_iterations,
            concurrency: section.concurrency,
            fetch_timeout: Duration::from_secs(section.fetch_timeout_secs),
            git_timeout: Duration::from_secs(section.git_timeout_secs),
            max_redirects: section.max_redirects,
            forge_domains: section.forge_domains,
            ref_strategy: RefStrategy::DefaultBranch,
            min_tools_version: semver::Version::new(4, 0, 0),
            max_tools_version: semver::Version::new(5, 10, 0),
        }
    }
}

impl CrawlerConfig {
    /// Builds the crawler settings from the core section.
    ///
    /// # Errors
    ///
    /// `CrawlError::Config` if a string field cannot be parsed or the result
    /// fails [`validate`](Self::validate).
    pub fn from_core(core: &CrawlerSection) -> Result<Self, CrawlError> {
        let ref_strategy =
            RefStrategy::from_str_loose(&core.ref_strategy).ok_or_else(|| CrawlError::Config {
                field: "ref_strategy".to_owned(),
                reason: format!("unknown strategy '{}'", core.ref_strategy),
            })?;

        let self_identity = Some(core.self_identity.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_owned);

        let config = Self {
            seed_source: core.seed_source.clone(),
            self_identity,
            output_path: core.output_path.clone(),
            max_iterations: core.max_iterations,
            concurrency: core.concurrency,
            fetch_timeout: Duration::from_secs(core.fetch_timeout_secs),
            git_timeout: Duration::from_secs(core.git_timeout_secs),
            max_redirects: core.max_redirects,
            forge_domains: core.forge_domains.clone(),
            ref_strategy,
            min_tools_version: parse_tools_version("min_tools_version", &core.min_tools_version)?,
            max_tools_version: parse_tools_version("max_tools_version", &core.max_tools_version)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the settings.
    ///
    /// # Rules
    ///
    /// - `seed_source`, `output_path`: non-empty
    /// - `max_iterations`, `max_redirects`: at least 1
    /// - `fetch_timeout`, `git_timeout`: non-zero
    /// - `forge_domains`: at least one
    /// - `min_tools_version <= max_tools_version`
    pub fn validate(&self) -> Result<(), CrawlError> {
        if self.seed_source.trim().is_empty() {
            return Err(config_err("seed_source", "must not be empty"));
        }
        if self.output_path.trim().is_empty() {
            return Err(config_err("output_path", "must not be empty"));
        }
        if self.max_iterations == 0 {
            return Err(config_err("max_iterations", "must be at least 1"));
        }
        if self.max_redirects == 0 {
            return Err(config_err("max_redirects", "must be at least 1"));
        }
        if self.fetch_timeout.is_zero() {
            return Err(config_err("fetch_timeout", "must be non-zero"));
        }
        if self.git_timeout.is_zero() {
            return Err(config_err("git_timeout", "must be non-zero"));
        }
        if self.forge_domains.is_empty() {
            return Err(config_err("forge_domains", "at least one domain required"));
        }
        if self.min_tools_version > self.max_tools_version {
            return Err(config_err(
                "min_tools_version",
                &format!(
                    "{} is newer than max_tools_version {}",
                    self.min_tools_version, self.max_tools_version
                ),
            ));
        }
        Ok(())
    }

    /// Concurrency to use, resolving 0 to the number of available cores.
    pub fn effective_concurrency(&self) -> usize {
        if self.concurrency > 0 {
            return self.concurrency;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }
}

fn config_err(field: &str, reason: &str) -> CrawlError {
    CrawlError::Config {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

/// Accepts `N.N.N` or `N.N`.
fn parse_tools_version(field: &str, value: &str) -> Result<semver::Version, CrawlError> {
    let value = value.trim();
    semver::Version::parse(value)
        .or_else(|_| semver::Version::parse(&format!("{value}.0")))
        .map_err(|e| config_err(field, &format!("'{value}' is not a version: {e}")))
}

/// [`CrawlerConfig`] builder; `build` validates.
#[derive(Default)]
pub struct CrawlerConfigBuilder {
    config: CrawlerConfig,
}

impl CrawlerConfigBuilder {
    /// Builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the seed list location.
    pub fn seed_source(mut self, source: impl Into<String>) -> Self {
        self.config.seed_source = source.into();
        self
    }

    /// Sets the extra seed.
    pub fn self_identity(mut self, identity: impl Into<String>) -> Self {
        self.config.self_identity = Some(identity.into());
        self
    }

    /// Sets the persisted graph path.
    pub fn output_path(mut self, path: impl Into<String>) -> Self {
        self.config.output_path = path.into();
        self
    }

    /// Sets the iteration budget.
    pub fn max_iterations(mut self, max: u32) -> Self {
        self.config.max_iterations = max;
        self
    }

    /// Sets the batch concurrency.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Sets the HTTP deadline.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = timeout;
        self
    }

    /// Sets the git query deadline.
    pub fn git_timeout(mut self, timeout: Duration) -> Self {
        self.config.git_timeout = timeout;
        self
    }

    /// Sets the redirect cap.
    pub fn max_redirects(mut self, max: u32) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Sets the accepted forge hosts.
    pub fn forge_domains(mut self, domains: Vec<String>) -> Self {
        self.config.forge_domains = domains;
        self
    }

    /// Sets the ref strategy.
    pub fn ref_strategy(mut self, strategy: RefStrategy) -> Self {
        self.config.ref_strategy = strategy;
        self
    }

    /// Sets the supported tools version range.
    pub fn tools_versions(mut self, min: semver::Version, max: semver::Version) -> Self {
        self.config.min_tools_version = min;
        self.config.max_tools_version = max;
        self
    }

    /// Validates and returns the settings.
    ///
    /// # Errors
    ///
    /// `CrawlError::Config` on validation failure.
    pub fn build(self) -> Result<CrawlerConfig, CrawlError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
