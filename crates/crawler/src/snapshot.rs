//! Persisted graph file.
//!
//! The file is a JSON object keyed by identity:
//!
//! ```json
//! {
//!   "https://github.com/apple/swift-nio": {
//!     "on": ["https://github.com/apple/swift-atomics"],
//!     "to": ["https://github.com/vapor/vapor"],
//!     "error": null
//!   }
//! }
//! ```
//!
//! Keys are written in sorted order and `on`/`to` are sorted by last path
//! segment, then by full identity, so re-running a crawl produces a minimal
//! diff.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CrawlError, ErrorKind};
use crate::graph::{GraphStore, Node};
use crate::identity::{PackageIdentity, last_segment};

/// One node as written to disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedNode {
    /// Dependencies
    #[serde(default)]
    pub on: Vec<PackageIdentity>,
    /// Dependents
    #[serde(default)]
    pub to: Vec<PackageIdentity>,
    /// Failure classification
    #[serde(default)]
    pub error: Option<ErrorKind>,
}

/// Whole graph as written to disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphSnapshot {
    /// Nodes keyed by identity
    pub nodes: BTreeMap<PackageIdentity, PersistedNode>,
}

impl GraphSnapshot {
    /// Captures the current state of `store`.
    pub fn from_store(store: &GraphStore) -> Self {
        let nodes = store
            .snapshot()
            .into_iter()
            .map(|(identity, node)| {
                let persisted = PersistedNode {
                    on: sorted_identities(node.dependencies),
                    to: sorted_identities(node.dependents),
                    error: node.error,
                };
                (identity, persisted)
            })
            .collect();
        Self { nodes }
    }

    /// Builds a store from this snapshot; every node is treated as resolved.
    pub fn into_store(self, forge_domains: Vec<String>) -> GraphStore {
        let nodes = self.nodes.into_iter().map(|(identity, persisted)| {
            let node = Node {
                dependencies: persisted.on.into_iter().collect(),
                dependents: persisted.to.into_iter().collect(),
                resolved: true,
                error: persisted.error,
            };
            (identity, node)
        });
        GraphStore::from_nodes(nodes, forge_domains)
    }

    /// Decodes the file format.
    ///
    /// # Errors
    ///
    /// `CrawlError::Snapshot` on malformed JSON.
    pub fn from_json(json: &str, source: &str) -> Result<Self, CrawlError> {
        serde_json::from_str(json).map_err(|e| CrawlError::Snapshot {
            path: source.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Encodes the file format.
    ///
    /// # Errors
    ///
    /// `CrawlError::Snapshot` if serialisation fails.
    pub fn to_json(&self) -> Result<String, CrawlError> {
        serde_json::to_string_pretty(self).map_err(|e| CrawlError::Snapshot {
            path: String::new(),
            reason: e.to_string(),
        })
    }

    /// Reads a snapshot from `path`.
    ///
    /// # Errors
    ///
    /// - `CrawlError::Io`: unreadable file
    /// - `CrawlError::Snapshot`: malformed content
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CrawlError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CrawlError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
        let snapshot = Self::from_json(&content, &path.display().to_string())?;
        info!(path = %path.display(), nodes = snapshot.nodes.len(), "loaded graph snapshot");
        Ok(snapshot)
    }

    /// Writes the snapshot to `path` via a sibling temp file and rename.
    ///
    /// # Errors
    ///
    /// `CrawlError::Io` on write failure.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), CrawlError> {
        let path = path.as_ref();
        let mut json = self.to_json()?;
        json.push('\n');

        let io_err = |e: std::io::Error| CrawlError::Io {
            path: path.display().to_string(),
            source: e,
        };

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(io_err)?;

        info!(path = %path.display(), nodes = self.nodes.len(), "wrote graph snapshot");
        Ok(())
    }
}

/// Sorts by last path segment, ties broken by the full identity.
pub fn sorted_identities(identities: impl IntoIterator<Item = PackageIdentity>) -> Vec<PackageIdentity> {
    let mut list: Vec<PackageIdentity> = identities.into_iter().collect();
    list.sort_by(|a, b| {
        last_segment(a)
            .cmp(last_segment(b))
            .then_with(|| a.cmp(b))
    });
    list
}
