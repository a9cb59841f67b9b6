//! Manifest interpretation -- raw manifest bytes to dependency references
//!
//! [`ManifestInterpreter`] is the interface every interpreter implements.
//! [`ManifestVariant`] names the manifest files a repository may carry, each
//! with the format version it implies.
//!
//! # Supported interpreters
//!
//! - `Package.swift` family -- [`SwiftManifestInterpreter`]
//!
//! # Extending
//!
//! Implement `ManifestInterpreter` and hand it to `PackageFetcher`.

pub mod swift;

use crate::error::CrawlError;

pub use swift::SwiftManifestInterpreter;

/// Manifest interpreter trait
///
/// Interpretation is CPU-bound and synchronous; callers run it on the
/// blocking pool.
pub trait ManifestInterpreter: Send + Sync + 'static {
    /// Extracts the declared dependency references.
    ///
    /// # Arguments
    ///
    /// - `content`: raw manifest bytes
    /// - `format_hint`: format version implied by the manifest's file name,
    ///   used when the manifest does not declare one
    ///
    /// # Errors
    ///
    /// - `CrawlError::InvalidManifest`: parse/evaluation failure
    /// - `CrawlError::InvalidToolsVersion`: format newer than supported
    fn extract_dependencies(
        &self,
        content: &[u8],
        format_hint: Option<&semver::Version>,
    ) -> Result<Vec<String>, CrawlError>;
}

/// One manifest file name a repository may carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestVariant {
    /// File name at the repository root
    pub file_name: String,
    /// Format version implied by the file name
    pub format_hint: Option<semver::Version>,
}

impl ManifestVariant {
    /// Variant without an implied version.
    pub fn plain(file_name: &str) -> Self {
        Self {
            file_name: file_name.to_owned(),
            format_hint: None,
        }
    }

    /// Version-suffixed variant.
    pub fn versioned(file_name: &str, major: u64, minor: u64) -> Self {
        Self {
            file_name: file_name.to_owned(),
            format_hint: Some(semver::Version::new(major, minor, 0)),
        }
    }

    /// Candidates in the order they are tried.
    ///
    /// Version-suffixed files are alternate schema versions living next to
    /// the plain `Package.swift`.
    pub fn default_candidates() -> Vec<Self> {
        vec![
            Self::versioned("Package@swift-5.swift", 5, 0),
            Self::plain("Package.swift"),
            Self::versioned("Package@swift-4.2.swift", 4, 2),
            Self::versioned("Package@swift-4.swift", 4, 0),
        ]
    }
}
