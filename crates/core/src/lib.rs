//! Shared building blocks for the depgraph workspace.
//!
//! - [`config`]: `depgraph.toml` loading, env overrides and validation
//! - [`error`]: top-level error type used at the binary boundary

pub mod config;
pub mod error;

// --- re-exports ---

pub use config::{CrawlerSection, DepGraphConfig, GeneralConfig};
pub use error::{ConfigError, CrawlFailure, DepGraphError};
