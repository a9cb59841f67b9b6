//! Package identity normalisation
//!
//! Every reference that reaches the graph goes through [`normalize`], so two
//! spellings of the same repository share one key:
//!
//! ```text
//! GIT@GitHub.com:Org/Repo.git   --+
//! https://github.com/org/repo/  --+--> https://github.com/org/repo
//! https://github.com/org/repo   --+
//! ```
//!
//! [`is_well_formed_repository_reference`] decides whether a reference may
//! become a dependency edge at all.

use std::sync::LazyLock;

use regex::Regex;

/// Canonical string key of a package.
pub type PackageIdentity = String;

static SSH_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@/\s]+@([^:/\s]+):(.+)$").unwrap_or_else(|_| panic!("invalid ssh regex"))
});

/// Canonicalises a repository reference.
///
/// Lower-cases, rewrites `user@host:path` to `https://host/path`, then strips
/// trailing `/` and `.git` until neither remains. Total and idempotent.
pub fn normalize(reference: &str) -> PackageIdentity {
    let lowered = reference.trim().to_lowercase();

    let mut identity = match SSH_REF_RE.captures(&lowered) {
        Some(caps) if !lowered.contains("://") => {
            format!("https://{}/{}", &caps[1], &caps[2])
        }
        _ => lowered,
    };

    loop {
        if let Some(stripped) = identity.strip_suffix('/') {
            identity.truncate(stripped.len());
        } else if let Some(stripped) = identity.strip_suffix(".git") {
            identity.truncate(stripped.len());
        } else {
            break;
        }
    }

    identity
}

/// Checks whether `reference` may be used as a dependency edge.
///
/// Accepted shapes:
/// - `user@host:org/repo` (exactly two `/`-delimited segments)
/// - `http(s)://<forge>/org/repo...` where `<forge>` is one of `forge_domains`
///   (optionally `www.`-prefixed) and there are at least four non-empty
///   `/`-delimited segments
pub fn is_well_formed_repository_reference(reference: &str, forge_domains: &[String]) -> bool {
    let segments: Vec<&str> = reference.split('/').filter(|s| !s.is_empty()).collect();

    if !reference.contains("://") && SSH_REF_RE.is_match(reference) {
        return segments.len() == 2;
    }

    let lowered = reference.to_lowercase();
    if !(lowered.starts_with("https://") || lowered.starts_with("http://")) {
        return false;
    }

    if segments.len() < 4 {
        return false;
    }

    let host = segments[1].to_lowercase();
    forge_domains.iter().any(|domain| {
        let domain = domain.to_lowercase();
        host == domain || host.strip_prefix("www.") == Some(domain.as_str())
    })
}

/// Last `/`-delimited segment of an identity, used as the primary sort key
/// in the persisted graph.
pub fn last_segment(identity: &str) -> &str {
    identity.rsplit('/').next().unwrap_or(identity)
}
