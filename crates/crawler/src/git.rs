//! Default branch and version tag resolution.
//!
//! [`GitRemote`] abstracts the two remote queries the crawler needs; the
//! production [`GitCli`] shells out to `git ls-remote` under a deadline.
//! [`BranchResolver`] turns their raw output into a branch name or a tag and
//! never fails: query errors collapse into the fallback value.

use std::future::Future;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tracing::debug;

use crate::error::CrawlError;

/// Branch used when the remote HEAD cannot be determined.
pub const FALLBACK_BRANCH: &str = "master";

const HEADS_PREFIX: &str = "refs/heads/";
const TAGS_PREFIX: &str = "refs/tags/";

static TRIPLE_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\.(\d+)\.(\d+)$").unwrap_or_else(|_| panic!("invalid version regex"))
});
static PAIR_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\.(\d+)$").unwrap_or_else(|_| panic!("invalid version regex"))
});

/// Remote ref queries.
///
/// Both methods return the raw `git ls-remote` style output.
pub trait GitRemote: Send + Sync + 'static {
    /// Output of `git ls-remote --symref <repo> HEAD`.
    fn symbolic_head(
        &self,
        repo_url: &str,
    ) -> impl Future<Output = Result<String, CrawlError>> + Send;

    /// Output of `git ls-remote --tags <repo>`.
    fn tags(&self, repo_url: &str) -> impl Future<Output = Result<String, CrawlError>> + Send;
}

/// `git` binary driven through `tokio::process`.
pub struct GitCli {
    program: String,
    timeout: Duration,
}

impl GitCli {
    /// Uses `git` from `PATH` with the given per-query deadline.
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "git".to_owned(),
            timeout,
        }
    }

    /// Overrides the git executable.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    async fn run(&self, args: &[&str]) -> Result<String, CrawlError> {
        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                CrawlError::GitQueryFailed(format!(
                    "git {} timed out after {:?}",
                    args.join(" "),
                    self.timeout
                ))
            })?
            .map_err(|e| CrawlError::GitQueryFailed(format!("failed to spawn git: {e}")))?;

        if !output.status.success() {
            return Err(CrawlError::GitQueryFailed(format!(
                "git {} exited with {}: {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl GitRemote for GitCli {
    async fn symbolic_head(&self, repo_url: &str) -> Result<String, CrawlError> {
        self.run(&["ls-remote", "--symref", repo_url, "HEAD"]).await
    }

    async fn tags(&self, repo_url: &str) -> Result<String, CrawlError> {
        self.run(&["ls-remote", "--tags", repo_url]).await
    }
}

/// Resolves branch names and version tags for a repository.
pub struct BranchResolver<G> {
    remote: Arc<G>,
}

impl<G> Clone for BranchResolver<G> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
        }
    }
}

impl<G: GitRemote> BranchResolver<G> {
    /// Creates a resolver over `remote`.
    pub fn new(remote: Arc<G>) -> Self {
        Self { remote }
    }

    /// Default branch of `repo_url`, or [`FALLBACK_BRANCH`] on any failure.
    pub async fn default_branch(&self, repo_url: &str) -> String {
        match self.remote.symbolic_head(repo_url).await {
            Ok(output) => parse_default_branch(&output).unwrap_or_else(|| {
                debug!(repo = repo_url, "unparseable HEAD ref, using fallback branch");
                FALLBACK_BRANCH.to_owned()
            }),
            Err(e) => {
                debug!(repo = repo_url, error = %e, "HEAD query failed, using fallback branch");
                FALLBACK_BRANCH.to_owned()
            }
        }
    }

    /// Latest semantic-version tag of `repo_url`, if any.
    pub async fn latest_version_tag(&self, repo_url: &str) -> Option<String> {
        match self.try_latest_version_tag(repo_url).await {
            Ok(tag) => Some(tag),
            Err(e) => {
                debug!(repo = repo_url, error = %e, "no usable version tag");
                None
            }
        }
    }

    /// Like [`latest_version_tag`](Self::latest_version_tag) but keeps the reason.
    ///
    /// # Errors
    ///
    /// - `CrawlError::GitQueryFailed`: the tag listing failed
    /// - `CrawlError::NoVersions`: no tag carries a version
    pub async fn try_latest_version_tag(&self, repo_url: &str) -> Result<String, CrawlError> {
        let output = self.remote.tags(repo_url).await?;
        latest_version(&parse_tag_names(&output)).ok_or(CrawlError::NoVersions)
    }
}

/// Extracts the branch from `ls-remote --symref HEAD` output.
///
/// The second whitespace-delimited token is the symbolic ref
/// (`ref: refs/heads/main  HEAD`).
pub fn parse_default_branch(output: &str) -> Option<String> {
    let token = output.split_whitespace().nth(1)?;
    let branch = token.strip_prefix(HEADS_PREFIX)?;
    (!branch.is_empty()).then(|| branch.to_owned())
}

/// Tag names from `ls-remote --tags` output, peeled duplicates removed.
pub fn parse_tag_names(output: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for line in output.lines() {
        let Some(reference) = line.split_whitespace().nth(1) else {
            continue;
        };
        let Some(name) = reference.strip_prefix(TAGS_PREFIX) else {
            continue;
        };
        let name = name.strip_suffix("^{}").unwrap_or(name);
        if !names.iter().any(|n| n == name) {
            names.push(name.to_owned());
        }
    }
    names
}

/// Parses the trailing version of a tag.
///
/// `N.N.N` wins; a bare `N.N` is read as `N.N.0`. Anything else is `None`.
pub fn tag_version(tag: &str) -> Option<semver::Version> {
    if let Some(caps) = TRIPLE_VERSION_RE.captures(tag) {
        return Some(semver::Version::new(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        ));
    }
    let caps = PAIR_VERSION_RE.captures(tag)?;
    Some(semver::Version::new(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        0,
    ))
}

/// Picks the tag with the highest numeric version, returning its original
/// spelling.
pub fn latest_version(tags: &[String]) -> Option<String> {
    let mut versioned: Vec<(semver::Version, &String)> = tags
        .iter()
        .filter_map(|tag| tag_version(tag).map(|v| (v, tag)))
        .collect();
    versioned.sort_by(|a, b| a.0.cmp(&b.0));
    versioned.pop().map(|(_, tag)| tag.clone())
}

/// Test remote with canned outputs; unknown repositories fail.
#[cfg(test)]
#[derive(Default)]
pub struct MockGitRemote {
    /// repo -> `--symref HEAD` output
    pub heads: std::collections::HashMap<String, String>,
    /// repo -> `--tags` output
    pub tags: std::collections::HashMap<String, String>,
}

#[cfg(test)]
impl MockGitRemote {
    /// Remote that knows no repositories.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `branch` as HEAD of `repo`.
    pub fn with_head(mut self, repo: &str, branch: &str) -> Self {
        self.heads.insert(
            repo.to_owned(),
            format!("ref: refs/heads/{branch}\tHEAD\n0123abcd\tHEAD\n"),
        );
        self
    }

    /// Declares tags for `repo`.
    pub fn with_tags(mut self, repo: &str, tags: &[&str]) -> Self {
        let output = tags
            .iter()
            .map(|t| format!("0123abcd\trefs/tags/{t}\n"))
            .collect::<String>();
        self.tags.insert(repo.to_owned(), output);
        self
    }
}

#[cfg(test)]
impl GitRemote for MockGitRemote {
    async fn symbolic_head(&self, repo_url: &str) -> Result<String, CrawlError> {
        self.heads
            .get(repo_url)
            .cloned()
            .ok_or_else(|| CrawlError::GitQueryFailed(format!("unknown repo {repo_url}")))
    }

    async fn tags(&self, repo_url: &str) -> Result<String, CrawlError> {
        self.tags
            .get(repo_url)
            .cloned()
            .ok_or_else(|| CrawlError::GitQueryFailed(format!("unknown repo {repo_url}")))
    }
}
