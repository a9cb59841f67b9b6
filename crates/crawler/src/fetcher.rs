//! Package fetcher: identity to dependency list.
//!
//! One [`PackageFetcher::resolve`] call is the unit of crawl work. It picks a
//! git ref, walks the manifest candidates in order, and hands the first
//! fetched manifest that interprets cleanly back as normalised identities.
//! It never touches the graph.

use std::sync::Arc;

use reqwest::Url;
use tracing::{debug, warn};

use crate::config::RefStrategy;
use crate::error::CrawlError;
use crate::git::{BranchResolver, GitRemote};
use crate::identity::{PackageIdentity, is_well_formed_repository_reference, normalize};
use crate::manifest::{ManifestInterpreter, ManifestVariant};
use crate::transport::{HttpTransport, fetch_bytes};

const GITHUB_HOST: &str = "github.com";
const GITHUB_RAW_HOST: &str = "raw.githubusercontent.com";
const GITLAB_HOST: &str = "gitlab.com";

/// Resolves a package's declared dependencies.
pub struct PackageFetcher<T, G, M> {
    transport: Arc<T>,
    resolver: BranchResolver<G>,
    interpreter: Arc<M>,
    variants: Vec<ManifestVariant>,
    max_redirects: u32,
    forge_domains: Vec<String>,
    ref_strategy: RefStrategy,
}

impl<T, G, M> PackageFetcher<T, G, M>
where
    T: HttpTransport,
    G: GitRemote,
    M: ManifestInterpreter,
{
    /// Fetcher over the given collaborators with the default candidate list.
    pub fn new(
        transport: Arc<T>,
        remote: Arc<G>,
        interpreter: Arc<M>,
        forge_domains: Vec<String>,
    ) -> Self {
        Self {
            transport,
            resolver: BranchResolver::new(remote),
            interpreter,
            variants: ManifestVariant::default_candidates(),
            max_redirects: 10,
            forge_domains,
            ref_strategy: RefStrategy::DefaultBranch,
        }
    }

    /// Sets the redirect cap used for manifest fetches.
    pub fn with_max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Sets how the manifest ref is chosen.
    pub fn with_ref_strategy(mut self, strategy: RefStrategy) -> Self {
        self.ref_strategy = strategy;
        self
    }

    /// Replaces the manifest candidate list.
    pub fn with_variants(mut self, variants: Vec<ManifestVariant>) -> Self {
        self.variants = variants;
        self
    }

    /// Shared transport, also used for the seed list.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Forge hosts accepted by the well-formedness filter.
    pub fn forge_domains(&self) -> &[String] {
        &self.forge_domains
    }

    /// Redirect cap.
    pub fn max_redirects(&self) -> u32 {
        self.max_redirects
    }

    /// Resolves `identity` into its normalised, well-formed dependencies.
    ///
    /// # Errors
    ///
    /// When no candidate succeeds: the first interpreter error if any
    /// manifest was fetched, otherwise the last fetch error.
    /// `CrawlError::InvalidUrl` if no fetch target can be derived.
    pub async fn resolve(&self, identity: &str) -> Result<Vec<PackageIdentity>, CrawlError> {
        let git_ref = self.select_ref(identity).await;
        debug!(identity, git_ref = %git_ref, "resolving manifest");

        let mut first_interpreter_error: Option<CrawlError> = None;
        let mut last_fetch_error: Option<CrawlError> = None;

        for variant in &self.variants {
            let url = raw_manifest_url(identity, &git_ref, &variant.file_name)?;

            let bytes = match fetch_bytes(self.transport.as_ref(), &url, self.max_redirects).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!(url = %url, error = %e, "manifest candidate unavailable");
                    last_fetch_error = Some(e);
                    continue;
                }
            };

            match self.interpret(bytes, variant.format_hint.clone()).await {
                Ok(references) => return Ok(self.filter_references(identity, references)),
                Err(e) => {
                    debug!(url = %url, error = %e, "manifest candidate rejected");
                    if first_interpreter_error.is_none() {
                        first_interpreter_error = Some(e);
                    }
                }
            }
        }

        Err(first_interpreter_error
            .or(last_fetch_error)
            .unwrap_or_else(|| CrawlError::LoadFailed(identity.to_owned())))
    }

    async fn select_ref(&self, identity: &str) -> String {
        if self.ref_strategy == RefStrategy::LatestTag {
            if let Some(tag) = self.resolver.latest_version_tag(identity).await {
                return tag;
            }
        }
        self.resolver.default_branch(identity).await
    }

    async fn interpret(
        &self,
        bytes: Vec<u8>,
        format_hint: Option<semver::Version>,
    ) -> Result<Vec<String>, CrawlError> {
        let interpreter = Arc::clone(&self.interpreter);
        tokio::task::spawn_blocking(move || {
            interpreter.extract_dependencies(&bytes, format_hint.as_ref())
        })
        .await
        .map_err(|e| CrawlError::Task(format!("manifest interpretation aborted: {e}")))?
    }

    fn filter_references(&self, identity: &str, references: Vec<String>) -> Vec<PackageIdentity> {
        let mut identities: Vec<PackageIdentity> = Vec::with_capacity(references.len());
        for reference in references {
            let normalized = normalize(&reference);
            if !is_well_formed_repository_reference(&normalized, &self.forge_domains) {
                warn!(identity, reference = %reference, "dropping malformed dependency reference");
                continue;
            }
            if !identities.contains(&normalized) {
                identities.push(normalized);
            }
        }
        identities
    }
}

/// Raw-content URL of `file` at `git_ref` in the repository `identity`.
///
/// # Errors
///
/// `CrawlError::InvalidUrl` if `identity` has no scheme, host or path.
pub fn raw_manifest_url(identity: &str, git_ref: &str, file: &str) -> Result<String, CrawlError> {
    let url = Url::parse(identity).map_err(|e| CrawlError::InvalidUrl(format!("{identity}: {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| CrawlError::InvalidUrl(format!("{identity}: missing host")))?;
    let path = url.path().trim_end_matches('/');
    if path.is_empty() {
        return Err(CrawlError::InvalidUrl(format!("{identity}: missing path")));
    }

    let host = host.strip_prefix("www.").unwrap_or(host);
    let base = identity.trim_end_matches('/');
    let raw = match host {
        GITHUB_HOST => format!("https://{GITHUB_RAW_HOST}{path}/{git_ref}/{file}"),
        GITLAB_HOST => format!("{base}/-/raw/{git_ref}/{file}"),
        _ => format!("{base}/{git_ref}/{file}"),
    };
    Ok(raw)
}
