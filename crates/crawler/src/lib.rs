//! Incremental dependency graph crawler for Swift packages.
//!
//! Starting from a seed list of repository references, the crawler fetches
//! each repository's package manifest, extracts the declared dependencies,
//! and keeps resolving newly discovered references until no unresolved
//! reference remains or the iteration budget runs out. Per-package failures
//! are recorded on the graph node instead of aborting the crawl.
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`CrawlError`, `ErrorKind`)
//! - [`config`]: Crawler configuration (`CrawlerConfig`, builder, `RefStrategy`)
//! - [`identity`]: Reference normalisation and well-formedness
//! - [`transport`]: HTTP fetch with redirect and status classification
//! - [`git`]: Default branch and version tag resolution
//! - [`manifest`]: Manifest interpretation (`ManifestInterpreter`, `SwiftManifestInterpreter`)
//! - [`fetcher`]: Fetch-with-fallback resolution of one package (`PackageFetcher`)
//! - [`graph`]: Concurrent graph store (`GraphStore`, `Node`)
//! - [`snapshot`]: Persisted graph file (`GraphSnapshot`)
//! - [`seed`]: Seed list source (`SeedSource`)
//! - [`crawler`]: The fixpoint driver (`Crawler`, `CrawlSummary`)
//!
//! # Architecture
//!
//! ```text
//! SeedSource --> Crawler --(batch)--> PackageFetcher --+--> BranchResolver --> GitRemote
//!                  ^                       |            |
//!                  |                       |            +--> fetch_bytes --> HttpTransport
//!                  |                       |            |
//!                  |                       |            +--> ManifestInterpreter
//!                  |                       v
//!                  +---- unresolved --- GraphStore --> GraphSnapshot --> dependencies.json
//! ```

pub mod config;
pub mod crawler;
pub mod error;
pub mod fetcher;
pub mod git;
pub mod graph;
pub mod identity;
pub mod manifest;
pub mod seed;
pub mod snapshot;
pub mod transport;

// --- Public API Re-exports ---

// Driver
pub use crawler::{CrawlSummary, Crawler};

// Configuration
pub use config::{CrawlerConfig, CrawlerConfigBuilder, RefStrategy};

// Error
pub use error::{CrawlError, ErrorKind};

// Collaborators
pub use fetcher::PackageFetcher;
pub use git::{BranchResolver, GitCli, GitRemote};
pub use manifest::{ManifestInterpreter, ManifestVariant, SwiftManifestInterpreter};
pub use seed::SeedSource;
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};

// Graph
pub use graph::{GraphStore, Node};
pub use identity::{PackageIdentity, normalize};
pub use snapshot::GraphSnapshot;
