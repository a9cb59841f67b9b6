//! Crawler error types
//!
//! [`CrawlError`] covers every failure the crawler can produce. Per-package
//! errors are folded into an [`ErrorKind`] and stored on the graph node; only
//! crawl-level failures travel up to the caller, via
//! `From<CrawlError> for DepGraphError`.
//!
//! # Categories
//!
//! - **Reference**: `InvalidUrl`
//! - **Manifest**: `InvalidManifest`, `InvalidToolsVersion`
//! - **Transport**: `EmptyBody`, `LoadFailed`, `Moved`
//! - **Git queries**: `GitQueryFailed`, `NoVersions` (swallowed by the resolver)
//! - **Crawl**: `Looping`, `CorruptGraph`, `Task`
//! - **Collaborators**: `SeedList`, `Snapshot`, `Io`, `Config`

use std::fmt;

use serde::{Deserialize, Serialize};

use depgraph_core::error::{ConfigError, CrawlFailure, DepGraphError};

/// Crawler domain error
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    /// The reference cannot be turned into a fetch target
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Manifest declares a format newer than the interpreter supports
    #[error("manifest requires tools version {declared} (newest supported: {supported})")]
    InvalidToolsVersion {
        /// Version declared by the manifest
        declared: String,
        /// Newest version the interpreter understands
        supported: String,
    },

    /// Manifest could not be parsed or evaluated
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// Crawl did not converge within the iteration budget
    #[error("crawl did not converge after {iterations} iterations")]
    Looping {
        /// Iteration budget that was exhausted
        iterations: u32,
    },

    /// Remote ref/tag query failed
    #[error("git query failed: {0}")]
    GitQueryFailed(String),

    /// No usable version tag was found
    #[error("no version tags found")]
    NoVersions,

    /// Response carried no readable bytes
    #[error("response body is empty")]
    EmptyBody,

    /// Non-success status
    #[error("failed to load {0}")]
    LoadFailed(String),

    /// Redirect without a usable `Location`
    #[error("moved: {}", .0.as_deref().unwrap_or("no location header"))]
    Moved(Option<String>),

    /// Graph invariant violated during removal
    #[error("corrupt graph: {0}")]
    CorruptGraph(String),

    /// Seed list could not be read or decoded
    #[error("seed list error: {source_ref}: {reason}")]
    SeedList {
        /// URL or path of the seed list
        source_ref: String,
        /// Failure reason
        reason: String,
    },

    /// Persisted graph could not be read or written
    #[error("snapshot error: {path}: {reason}")]
    Snapshot {
        /// Snapshot file path
        path: String,
        /// Failure reason
        reason: String,
    },

    /// File I/O error
    #[error("io error: {path}: {source}")]
    Io {
        /// Related path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// Configuration error
    #[error("config error: {field}: {reason}")]
    Config {
        /// Field name
        field: String,
        /// Reason
        reason: String,
    },

    /// A worker task panicked or was cancelled
    #[error("task error: {0}")]
    Task(String),
}

impl CrawlError {
    /// Classification recorded on a graph node when resolution fails.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidManifest(_) => ErrorKind::InvalidManifest,
            Self::InvalidToolsVersion { .. } => ErrorKind::RequiresLaterToolsVersion,
            Self::EmptyBody | Self::LoadFailed(_) | Self::Moved(_) => ErrorKind::FailedToLoad,
            _ => ErrorKind::Unknown,
        }
    }

    /// True for errors raised before any manifest was interpreted.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::EmptyBody | Self::LoadFailed(_) | Self::Moved(_))
    }
}

/// Persisted failure classification.
///
/// The serialized strings are part of the graph file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Manifest failed to parse or evaluate
    #[serde(rename = "InvalidManifest")]
    InvalidManifest,
    /// Manifest could not be fetched
    #[serde(rename = "FailedToLoad")]
    FailedToLoad,
    /// Manifest format is newer than the interpreter
    #[serde(rename = "Requires later version of Swift")]
    RequiresLaterToolsVersion,
    /// Anything else
    #[serde(rename = "Unknown")]
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidManifest => write!(f, "InvalidManifest"),
            Self::FailedToLoad => write!(f, "FailedToLoad"),
            Self::RequiresLaterToolsVersion => write!(f, "Requires later version of Swift"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

impl From<CrawlError> for DepGraphError {
    fn from(err: CrawlError) -> Self {
        match err {
            CrawlError::Looping { iterations } => {
                DepGraphError::Crawl(CrawlFailure::Looping { iterations })
            }
            CrawlError::SeedList { source_ref, reason } => DepGraphError::Crawl(
                CrawlFailure::SeedList(format!("{source_ref}: {reason}")),
            ),
            CrawlError::Snapshot { path, reason } => {
                DepGraphError::Crawl(CrawlFailure::Snapshot(format!("{path}: {reason}")))
            }
            CrawlError::CorruptGraph(msg) => DepGraphError::Crawl(CrawlFailure::CorruptGraph(msg)),
            CrawlError::Io { source, .. } => DepGraphError::Io(source),
            CrawlError::Config { field, reason } => {
                DepGraphError::Config(ConfigError::InvalidValue { field, reason })
            }
            other => DepGraphError::Crawl(CrawlFailure::Other(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_classify_as_failed_to_load() {
        assert_eq!(CrawlError::EmptyBody.kind(), ErrorKind::FailedToLoad);
        assert_eq!(
            CrawlError::LoadFailed("https://x".to_owned()).kind(),
            ErrorKind::FailedToLoad
        );
        assert_eq!(CrawlError::Moved(None).kind(), ErrorKind::FailedToLoad);
    }

    #[test]
    fn manifest_errors_classify() {
        assert_eq!(
            CrawlError::InvalidManifest("syntax".to_owned()).kind(),
            ErrorKind::InvalidManifest
        );
        let err = CrawlError::InvalidToolsVersion {
            declared: "6.0.0".to_owned(),
            supported: "5.10.0".to_owned(),
        };
        assert_eq!(err.kind(), ErrorKind::RequiresLaterToolsVersion);
        assert!(err.to_string().contains("6.0.0"));
    }

    #[test]
    fn other_errors_classify_as_unknown() {
        assert_eq!(
            CrawlError::InvalidUrl("nope".to_owned()).kind(),
            ErrorKind::Unknown
        );
        assert_eq!(CrawlError::Task("panic".to_owned()).kind(), ErrorKind::Unknown);
    }

    #[test]
    fn moved_display_without_location() {
        assert!(CrawlError::Moved(None).to_string().contains("no location"));
    }

    #[test]
    fn error_kind_serializes_to_file_format_strings() {
        let json = serde_json::to_string(&ErrorKind::RequiresLaterToolsVersion).unwrap();
        assert_eq!(json, "\"Requires later version of Swift\"");
        let back: ErrorKind = serde_json::from_str("\"FailedToLoad\"").unwrap();
        assert_eq!(back, ErrorKind::FailedToLoad);
    }

    #[test]
    fn looping_converts_to_crawl_failure() {
        let err: DepGraphError = CrawlError::Looping { iterations: 3 }.into();
        assert!(matches!(
            err,
            DepGraphError::Crawl(CrawlFailure::Looping { iterations: 3 })
        ));
    }

    #[test]
    fn config_converts_to_config_error() {
        let err: DepGraphError = CrawlError::Config {
            field: "max_tools_version".to_owned(),
            reason: "bad".to_owned(),
        }
        .into();
        assert!(matches!(err, DepGraphError::Config(_)));
    }
}
