//! Concurrent dependency graph.
//!
//! [`GraphStore`] owns every [`Node`]. All mutation goes through `add`,
//! `add_error` and `remove`, each holding one exclusive lock for its whole
//! read-modify-write, so concurrent resolutions never interleave inside a
//! single update.
//!
//! # Rules
//!
//! - First resolution wins: once a node is resolved, later `add`/`add_error`
//!   calls for it are no-ops.
//! - Dependents only grow during a crawl; only `remove` prunes them.
//! - Every stored dependency gets a placeholder node and a reverse edge.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CrawlError, ErrorKind};
use crate::identity::{PackageIdentity, is_well_formed_repository_reference, normalize};

/// One package in the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Outgoing edges
    pub dependencies: BTreeSet<PackageIdentity>,
    /// Incoming edges
    pub dependents: BTreeSet<PackageIdentity>,
    /// A fetch attempt has concluded for this node
    pub resolved: bool,
    /// Failure classification; implies `resolved`
    pub error: Option<ErrorKind>,
}

/// Thread-safe dependency graph.
pub struct GraphStore {
    nodes: Mutex<HashMap<PackageIdentity, Node>>,
    forge_domains: Vec<String>,
}

impl GraphStore {
    /// Empty graph; `forge_domains` drives the well-formedness filter on edges.
    pub fn new(forge_domains: Vec<String>) -> Self {
        Self {
            nodes: Mutex::new(HashMap::new()),
            forge_domains,
        }
    }

    /// Graph seeded from previously persisted nodes.
    ///
    /// Every loaded node is marked resolved regardless of its stored flag.
    pub fn from_nodes(
        nodes: impl IntoIterator<Item = (PackageIdentity, Node)>,
        forge_domains: Vec<String>,
    ) -> Self {
        let nodes = nodes
            .into_iter()
            .map(|(identity, mut node)| {
                node.resolved = true;
                (identity, node)
            })
            .collect();
        Self {
            nodes: Mutex::new(nodes),
            forge_domains,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PackageIdentity, Node>> {
        self.nodes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Upserts a node with its dependency set.
    ///
    /// Returns `false` when the node was already resolved and the call was
    /// ignored. Dependencies are normalised; malformed ones are dropped.
    pub fn add(&self, identity: &str, dependencies: Vec<String>, resolved: bool) -> bool {
        let mut nodes = self.lock();

        if nodes.get(identity).is_some_and(|n| n.resolved) {
            debug!(identity, "already resolved, ignoring add");
            return false;
        }

        let mut edges = BTreeSet::new();
        for dependency in dependencies {
            let normalized = normalize(&dependency);
            if is_well_formed_repository_reference(&normalized, &self.forge_domains) {
                edges.insert(normalized);
            } else {
                warn!(identity, dependency = %dependency, "dropping malformed dependency");
            }
        }

        for dependency in &edges {
            nodes
                .entry(dependency.clone())
                .or_default()
                .dependents
                .insert(identity.to_owned());
        }

        let node = nodes.entry(identity.to_owned()).or_default();
        node.dependencies = edges;
        node.resolved = resolved;
        node.error = None;
        true
    }

    /// Records a failed resolution.
    ///
    /// Same precedence as [`add`](Self::add): a resolved node is left alone.
    pub fn add_error(&self, identity: &str, error: ErrorKind) -> bool {
        let mut nodes = self.lock();

        if nodes.get(identity).is_some_and(|n| n.resolved) {
            debug!(identity, "already resolved, ignoring error");
            return false;
        }

        let node = nodes.entry(identity.to_owned()).or_default();
        node.error = Some(error);
        node.resolved = true;
        true
    }

    /// Removes `identity` and, recursively, everything that depends on it.
    ///
    /// Returns the removed identities.
    ///
    /// # Errors
    ///
    /// `CrawlError::CorruptGraph` if a dependency points at a missing node.
    pub fn remove(&self, identity: &str) -> Result<Vec<PackageIdentity>, CrawlError> {
        let mut nodes = self.lock();
        let mut removing = HashSet::new();
        let mut removed = Vec::new();
        remove_cascade(&mut nodes, identity, &mut removing, &mut removed)?;
        Ok(removed)
    }

    /// Removes every node whose identity contains `substring`, plus dependents.
    ///
    /// # Errors
    ///
    /// `CrawlError::CorruptGraph` as for [`remove`](Self::remove).
    pub fn remove_by_filter(&self, substring: &str) -> Result<Vec<PackageIdentity>, CrawlError> {
        let mut nodes = self.lock();
        let mut matches: Vec<PackageIdentity> = nodes
            .keys()
            .filter(|k| k.contains(substring))
            .cloned()
            .collect();
        matches.sort();

        let mut removed = Vec::new();
        for identity in matches {
            if nodes.contains_key(&identity) {
                let mut removing = HashSet::new();
                remove_cascade(&mut nodes, &identity, &mut removing, &mut removed)?;
            }
        }
        Ok(removed)
    }

    /// Identities with no concluded fetch, sorted.
    pub fn unresolved(&self) -> Vec<PackageIdentity> {
        let nodes = self.lock();
        let mut pending: Vec<PackageIdentity> = nodes
            .iter()
            .filter(|(_, n)| !n.resolved)
            .map(|(k, _)| k.clone())
            .collect();
        pending.sort();
        pending
    }

    /// Copy of one node.
    pub fn get(&self, identity: &str) -> Option<Node> {
        self.lock().get(identity).cloned()
    }

    /// True if `identity` is present and resolved.
    pub fn is_resolved(&self, identity: &str) -> bool {
        self.lock().get(identity).is_some_and(|n| n.resolved)
    }

    /// Consistent copy of the whole graph.
    pub fn snapshot(&self) -> HashMap<PackageIdentity, Node> {
        self.lock().clone()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of nodes carrying an error.
    pub fn failed_count(&self) -> usize {
        self.lock().values().filter(|n| n.error.is_some()).count()
    }
}

fn remove_cascade(
    nodes: &mut HashMap<PackageIdentity, Node>,
    identity: &str,
    removing: &mut HashSet<PackageIdentity>,
    removed: &mut Vec<PackageIdentity>,
) -> Result<(), CrawlError> {
    if !removing.insert(identity.to_owned()) {
        return Ok(());
    }
    let Some(node) = nodes.get(identity).cloned() else {
        return Ok(());
    };

    for dependency in &node.dependencies {
        if removing.contains(dependency) {
            continue;
        }
        match nodes.get_mut(dependency) {
            Some(dep) => {
                dep.dependents.remove(identity);
            }
            None => {
                return Err(CrawlError::CorruptGraph(format!(
                    "{identity} depends on missing node {dependency}"
                )));
            }
        }
    }

    for dependent in &node.dependents {
        remove_cascade(nodes, dependent, removing, removed)?;
    }

    nodes.remove(identity);
    debug!(identity, "removed node");
    removed.push(identity.to_owned());
    Ok(())
}
