//! HTTP transport abstraction.
//!
//! The [`HttpTransport`] trait hides the HTTP client so production code uses
//! [`ReqwestTransport`] while tests use `MockTransport`.
//!
//! ```text
//!   PackageFetcher / SeedSource
//!              |
//!              v
//!        fetch_bytes()        status classification + redirect following
//!              |
//!              v
//!       HttpTransport (trait)
//!         |          |
//!         v          v
//!     Reqwest       Mock
//! ```
//!
//! # Status handling
//!
//! - `200` with a non-empty body: success
//! - `200` with no body / zero bytes: `CrawlError::EmptyBody`
//! - `301` / `302`: follow `Location` once for this response; each hop is
//!   classified again. Missing header: `CrawlError::Moved(None)`
//! - anything else: `CrawlError::LoadFailed(url)`

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::CrawlError;

/// Raw response handed back by a transport.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// `Location` header, if present
    pub location: Option<String>,
    /// Response body, `None` when the response carried none
    pub body: Option<Vec<u8>>,
}

/// Trait abstracting a single HTTP GET.
///
/// Implementations must NOT follow redirects themselves; [`fetch_bytes`]
/// owns that policy.
pub trait HttpTransport: Send + Sync + 'static {
    /// Issues a GET for `url` and returns the raw response.
    ///
    /// # Errors
    ///
    /// Connection failures and deadline expiry return `CrawlError::LoadFailed`.
    fn get(&self, url: &str) -> impl Future<Output = Result<HttpResponse, CrawlError>> + Send;
}

/// Fetches `url` and returns its body, following up to `max_redirects` hops.
pub async fn fetch_bytes<T: HttpTransport>(
    transport: &T,
    url: &str,
    max_redirects: u32,
) -> Result<Vec<u8>, CrawlError> {
    let mut current = url.to_owned();
    let mut hops = 0u32;

    loop {
        let response = transport.get(&current).await?;
        debug!(url = %current, status = response.status, "http response");

        match response.status {
            200 => {
                return match response.body {
                    Some(body) if !body.is_empty() => Ok(body),
                    _ => Err(CrawlError::EmptyBody),
                };
            }
            301 | 302 => {
                let location = response.location.ok_or(CrawlError::Moved(None))?;
                hops += 1;
                if hops > max_redirects {
                    return Err(CrawlError::LoadFailed(current));
                }
                current = resolve_location(&current, &location)?;
            }
            _ => return Err(CrawlError::LoadFailed(current)),
        }
    }
}

/// Resolves a possibly relative `Location` against the URL that produced it.
fn resolve_location(base: &str, location: &str) -> Result<String, CrawlError> {
    let base = reqwest::Url::parse(base).map_err(|_| CrawlError::InvalidUrl(base.to_owned()))?;
    base.join(location)
        .map(|u| u.to_string())
        .map_err(|_| CrawlError::Moved(Some(location.to_owned())))
}

/// Production transport backed by `reqwest`.
///
/// Redirects are disabled on the client; every request carries the
/// configured deadline.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a client with the given request deadline.
    ///
    /// # Errors
    ///
    /// Returns `CrawlError::Config` if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self, CrawlError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("depgraph/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CrawlError::Config {
                field: "http_client".to_owned(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, CrawlError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            debug!(url, error = %e, "request failed");
            CrawlError::LoadFailed(url.to_owned())
        })?;

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response
            .bytes()
            .await
            .map_err(|_| CrawlError::LoadFailed(url.to_owned()))?;

        Ok(HttpResponse {
            status,
            location,
            body: Some(body.to_vec()),
        })
    }
}

/// Test transport serving canned responses; unknown URLs answer 404.
#[cfg(test)]
#[derive(Default)]
pub struct MockTransport {
    /// URL -> response
    pub responses: std::collections::HashMap<String, HttpResponse>,
    /// Every URL requested, in order
    pub requested: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockTransport {
    /// Empty transport; every request answers 404.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `body` with status 200 at `url`.
    pub fn with_body(mut self, url: &str, body: &str) -> Self {
        self.responses.insert(
            url.to_owned(),
            HttpResponse {
                status: 200,
                location: None,
                body: Some(body.as_bytes().to_vec()),
            },
        );
        self
    }

    /// Serves an arbitrary response at `url`.
    pub fn with_response(mut self, url: &str, response: HttpResponse) -> Self {
        self.responses.insert(url.to_owned(), response);
        self
    }

    /// URLs requested so far.
    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
impl HttpTransport for MockTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, CrawlError> {
        self.requested
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(url.to_owned());
        Ok(self.responses.get(url).cloned().unwrap_or(HttpResponse {
            status: 404,
            location: None,
            body: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redirect(location: Option<&str>) -> HttpResponse {
        HttpResponse {
            status: 301,
            location: location.map(str::to_owned),
            body: None,
        }
    }

    #[tokio::test]
    async fn returns_body_on_200() {
        let transport = MockTransport::new().with_body("https://h/a", "hello");
        let bytes = fetch_bytes(&transport, "https://h/a", 10).await.unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn empty_body_is_an_error() {
        let transport = MockTransport::new().with_body("https://h/a", "");
        let err = fetch_bytes(&transport, "https://h/a", 10).await.unwrap_err();
        assert!(matches!(err, CrawlError::EmptyBody));
    }

    #[tokio::test]
    async fn missing_body_is_an_error() {
        let transport = MockTransport::new().with_response(
            "https://h/a",
            HttpResponse {
                status: 200,
                location: None,
                body: None,
            },
        );
        let err = fetch_bytes(&transport, "https://h/a", 10).await.unwrap_err();
        assert!(matches!(err, CrawlError::EmptyBody));
    }

    #[tokio::test]
    async fn not_found_is_load_failed() {
        let transport = MockTransport::new();
        let err = fetch_bytes(&transport, "https://h/missing", 10)
            .await
            .unwrap_err();
        match err {
            CrawlError::LoadFailed(url) => assert_eq!(url, "https://h/missing"),
            other => panic!("expected LoadFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn follows_redirect_chain() {
        let transport = MockTransport::new()
            .with_response("https://h/a", redirect(Some("https://h/b")))
            .with_response("https://h/b", redirect(Some("/c")))
            .with_body("https://h/c", "done");

        let bytes = fetch_bytes(&transport, "https://h/a", 10).await.unwrap();
        assert_eq!(bytes, b"done");
        assert_eq!(
            transport.requested(),
            vec!["https://h/a", "https://h/b", "https://h/c"]
        );
    }

    #[tokio::test]
    async fn redirect_without_location_is_moved() {
        let transport = MockTransport::new().with_response("https://h/a", redirect(None));
        let err = fetch_bytes(&transport, "https://h/a", 10).await.unwrap_err();
        assert!(matches!(err, CrawlError::Moved(None)));
    }

    #[tokio::test]
    async fn redirect_loop_is_capped() {
        let transport = MockTransport::new()
            .with_response("https://h/a", redirect(Some("https://h/b")))
            .with_response("https://h/b", redirect(Some("https://h/a")));

        let err = fetch_bytes(&transport, "https://h/a", 3).await.unwrap_err();
        assert!(matches!(err, CrawlError::LoadFailed(_)));
        assert_eq!(transport.requested().len(), 4);
    }

    #[tokio::test]
    async fn server_error_is_load_failed() {
        let transport = MockTransport::new().with_response(
            "https://h/a",
            HttpResponse {
                status: 500,
                location: None,
                body: Some(b"oops".to_vec()),
            },
        );
        let err = fetch_bytes(&transport, "https://h/a", 10).await.unwrap_err();
        assert!(matches!(err, CrawlError::LoadFailed(_)));
    }
}
