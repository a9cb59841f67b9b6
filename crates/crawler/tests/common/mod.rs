//! Shared fakes for crawler integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use depgraph_crawler::{
    CrawlError, Crawler, CrawlerConfig, CrawlerConfigBuilder, GitRemote, GraphStore,
    HttpResponse, HttpTransport, PackageFetcher, SwiftManifestInterpreter,
};

pub const FORGE: &str = "example.com";

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn identity(repo: &str) -> String {
    format!("https://{FORGE}/org/{repo}")
}

/// Raw manifest URL for `repo` on the fallback branch.
pub fn manifest_url(repo: &str, file: &str) -> String {
    format!("https://{FORGE}/org/{repo}/master/{file}")
}

/// Minimal manifest declaring `deps` (repo names under the test forge).
pub fn manifest(deps: &[&str]) -> String {
    let packages = deps
        .iter()
        .map(|d| format!("        .package(url: \"{}.git\", from: \"1.0.0\"),\n", identity(d)))
        .collect::<String>();
    format!(
        "// swift-tools-version:5.2\nimport PackageDescription\n\nlet package = Package(\n    name: \"pkg\",\n    dependencies: [\n{packages}    ]\n)\n"
    )
}

/// Serves canned bodies; everything else is 404.
#[derive(Default)]
pub struct StaticTransport {
    bodies: HashMap<String, String>,
    requested: Mutex<Vec<String>>,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.bodies.insert(url.into(), body.into());
        self
    }

    /// Serves `Package.swift` for `repo` declaring `deps`.
    pub fn package(self, repo: &str, deps: &[&str]) -> Self {
        self.serve(manifest_url(repo, "Package.swift"), manifest(deps))
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl HttpTransport for StaticTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, CrawlError> {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_owned());
        Ok(match self.bodies.get(url) {
            Some(body) => HttpResponse {
                status: 200,
                location: None,
                body: Some(body.clone().into_bytes()),
            },
            None => HttpResponse {
                status: 404,
                location: None,
                body: None,
            },
        })
    }
}

/// Remote whose queries always fail, so every repository uses the fallback
/// branch.
pub struct UnreachableRemote;

impl GitRemote for UnreachableRemote {
    async fn symbolic_head(&self, repo_url: &str) -> Result<String, CrawlError> {
        Err(CrawlError::GitQueryFailed(format!("offline: {repo_url}")))
    }

    async fn tags(&self, repo_url: &str) -> Result<String, CrawlError> {
        Err(CrawlError::GitQueryFailed(format!("offline: {repo_url}")))
    }
}

pub type TestCrawler = Crawler<StaticTransport, UnreachableRemote, SwiftManifestInterpreter>;

pub fn config(max_iterations: u32) -> CrawlerConfig {
    CrawlerConfigBuilder::new()
        .max_iterations(max_iterations)
        .concurrency(4)
        .forge_domains(vec![FORGE.to_owned()])
        .build()
        .unwrap()
}

pub fn crawler_with_store(
    config: CrawlerConfig,
    transport: StaticTransport,
    store: Arc<GraphStore>,
) -> TestCrawler {
    let fetcher = PackageFetcher::new(
        Arc::new(transport),
        Arc::new(UnreachableRemote),
        Arc::new(SwiftManifestInterpreter::new(
            config.min_tools_version.clone(),
            config.max_tools_version.clone(),
        )),
        config.forge_domains.clone(),
    )
    .with_max_redirects(config.max_redirects);
    Crawler::new(config, fetcher, store)
}

pub fn crawler(config: CrawlerConfig, transport: StaticTransport) -> TestCrawler {
    let store = Arc::new(GraphStore::new(config.forge_domains.clone()));
    crawler_with_store(config, transport, store)
}
