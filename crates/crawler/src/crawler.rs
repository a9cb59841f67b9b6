//! Crawl driver: the fixpoint loop.
//!
//! ```text
//! Seeding ──> Fetching ──(next batch empty)──> Converged
//!                │  ^
//!                └──┘ next batch = unresolved nodes
//!                │
//!                └──(iteration budget exhausted)──> Aborted(Looping)
//! ```
//!
//! Each batch is a barrier: every resolution in it completes before the next
//! batch is computed. Results are folded into the [`GraphStore`] once the
//! whole batch has drained.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::CrawlerConfig;
use crate::error::CrawlError;
use crate::fetcher::PackageFetcher;
use crate::git::{GitCli, GitRemote};
use crate::graph::GraphStore;
use crate::identity::{PackageIdentity, normalize};
use crate::manifest::{ManifestInterpreter, SwiftManifestInterpreter};
use crate::seed::SeedSource;
use crate::transport::{HttpTransport, ReqwestTransport};

/// Outcome of a converged crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    /// Batches executed
    pub iterations: u32,
    /// Nodes in the graph afterwards
    pub nodes: usize,
    /// Nodes carrying an error
    pub failed: usize,
    /// Wall-clock duration
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Result of one resolution, keyed by the name that was resolved.
struct ResolveOutcome {
    name: String,
    result: Result<Vec<PackageIdentity>, CrawlError>,
}

/// Drives resolutions against a shared graph until it closes.
pub struct Crawler<T, G, M> {
    fetcher: Arc<PackageFetcher<T, G, M>>,
    store: Arc<GraphStore>,
    config: CrawlerConfig,
}

impl Crawler<ReqwestTransport, GitCli, SwiftManifestInterpreter> {
    /// Production crawler: reqwest transport, `git` CLI, Swift interpreter.
    ///
    /// # Errors
    ///
    /// `CrawlError::Config` if the HTTP client cannot be built.
    pub fn from_config(config: CrawlerConfig, store: Arc<GraphStore>) -> Result<Self, CrawlError> {
        let transport = ReqwestTransport::new(config.fetch_timeout)?;
        let remote = GitCli::new(config.git_timeout);
        let interpreter = SwiftManifestInterpreter::new(
            config.min_tools_version.clone(),
            config.max_tools_version.clone(),
        );
        let fetcher = PackageFetcher::new(
            Arc::new(transport),
            Arc::new(remote),
            Arc::new(interpreter),
            config.forge_domains.clone(),
        )
        .with_max_redirects(config.max_redirects)
        .with_ref_strategy(config.ref_strategy);

        Ok(Self::new(config, fetcher, store))
    }
}

impl<T, G, M> Crawler<T, G, M>
where
    T: HttpTransport,
    G: GitRemote,
    M: ManifestInterpreter,
{
    /// Crawler over an arbitrary fetcher.
    pub fn new(
        config: CrawlerConfig,
        fetcher: PackageFetcher<T, G, M>,
        store: Arc<GraphStore>,
    ) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            store,
            config,
        }
    }

    /// Graph being built.
    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    /// Loads the configured seed list and crawls from it.
    ///
    /// # Errors
    ///
    /// - `CrawlError::SeedList`: the seed list is unavailable
    /// - `CrawlError::Looping`: no convergence within `max_iterations`
    pub async fn run(&self) -> Result<CrawlSummary, CrawlError> {
        let seeds = SeedSource::parse(&self.config.seed_source)
            .load(self.fetcher.transport().as_ref(), self.fetcher.max_redirects())
            .await?;
        self.run_with_names(seeds).await
    }

    /// Crawls from an explicit seed list.
    ///
    /// # Errors
    ///
    /// `CrawlError::Looping` when the graph is still open after
    /// `max_iterations` batches.
    pub async fn run_with_names(&self, names: Vec<String>) -> Result<CrawlSummary, CrawlError> {
        let started = Instant::now();
        let mut batch = self.seed_batch(names);
        let mut remaining = self.config.max_iterations;
        let mut iterations = 0u32;

        info!(
            seeds = batch.len(),
            known = self.store.len(),
            max_iterations = self.config.max_iterations,
            "crawl started"
        );

        while !batch.is_empty() {
            iterations += 1;
            info!(iteration = iterations, batch = batch.len(), "fetching batch");
            self.fetch_batch(batch).await;

            batch = self.store.unresolved();
            if batch.is_empty() {
                break;
            }

            remaining = remaining.saturating_sub(1);
            if remaining == 0 {
                error!(
                    iterations,
                    pending = batch.len(),
                    "iteration budget exhausted before convergence"
                );
                return Err(CrawlError::Looping {
                    iterations: self.config.max_iterations,
                });
            }
        }

        let summary = CrawlSummary {
            iterations,
            nodes: self.store.len(),
            failed: self.store.failed_count(),
            elapsed: started.elapsed(),
        };
        info!(
            iterations = summary.iterations,
            nodes = summary.nodes,
            failed = summary.failed,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "crawl converged"
        );
        Ok(summary)
    }

    /// Seed list plus self identity, normalised, de-duplicated, minus
    /// anything the store already resolved.
    fn seed_batch(&self, names: Vec<String>) -> Vec<PackageIdentity> {
        let mut seen = HashSet::new();
        let mut batch = Vec::new();

        let extra = self.config.self_identity.iter().cloned();
        for name in names.into_iter().chain(extra) {
            let identity = normalize(&name);
            if identity.is_empty() || !seen.insert(identity.clone()) {
                continue;
            }
            if self.store.is_resolved(&identity) {
                debug!(identity = %identity, "already resolved in snapshot");
                continue;
            }
            batch.push(identity);
        }

        // Placeholders left unresolved by a prior run or a rebuild filter.
        for identity in self.store.unresolved() {
            if seen.insert(identity.clone()) {
                batch.push(identity);
            }
        }
        batch
    }

    async fn fetch_batch(&self, batch: Vec<PackageIdentity>) {
        let permits = Arc::new(Semaphore::new(self.config.effective_concurrency()));
        let mut tasks = JoinSet::new();

        for name in batch {
            let fetcher = Arc::clone(&self.fetcher);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return ResolveOutcome {
                        result: Err(CrawlError::Task("worker pool closed".to_owned())),
                        name,
                    };
                };
                let result = fetcher.resolve(&name).await;
                ResolveOutcome { name, result }
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                // The name stays unresolved and is retried next batch.
                Err(e) => error!(error = %e, "resolution task failed"),
            }
        }

        self.apply(outcomes);
    }

    fn apply(&self, outcomes: Vec<ResolveOutcome>) {
        for ResolveOutcome { name, result } in outcomes {
            match result {
                Ok(dependencies) => {
                    debug!(identity = %name, dependencies = dependencies.len(), "resolved");
                    self.store.add(&name, dependencies, true);
                }
                Err(e) => {
                    warn!(identity = %name, error = %e, kind = %e.kind(), "resolution failed");
                    self.store.add_error(&name, e.kind());
                }
            }
        }
    }
}
