//! Seed list source.
//!
//! A seed list is a JSON array of package references. Sources starting with
//! `http` are fetched through the transport; anything else is read from disk.

use std::path::Path;

use tracing::info;

use crate::error::CrawlError;
use crate::transport::{HttpTransport, fetch_bytes};

/// Where the seed list comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedSource {
    /// Remote JSON document
    Remote(String),
    /// Local JSON file
    Local(String),
}

impl SeedSource {
    /// Chooses remote or local by the `http` prefix.
    pub fn parse(source: &str) -> Self {
        if source.starts_with("http") {
            Self::Remote(source.to_owned())
        } else {
            Self::Local(source.to_owned())
        }
    }

    /// Location as given.
    pub fn location(&self) -> &str {
        match self {
            Self::Remote(url) | Self::Local(url) => url,
        }
    }

    /// Reads and decodes the list.
    ///
    /// # Errors
    ///
    /// `CrawlError::SeedList` if the list cannot be fetched, read or decoded.
    pub async fn load<T: HttpTransport>(
        &self,
        transport: &T,
        max_redirects: u32,
    ) -> Result<Vec<String>, CrawlError> {
        let seed_err = |reason: String| CrawlError::SeedList {
            source_ref: self.location().to_owned(),
            reason,
        };

        let bytes = match self {
            Self::Remote(url) => fetch_bytes(transport, url, max_redirects)
                .await
                .map_err(|e| seed_err(e.to_string()))?,
            Self::Local(path) => tokio::fs::read(Path::new(path))
                .await
                .map_err(|e| seed_err(e.to_string()))?,
        };

        let names = decode_seed_list(&bytes).map_err(seed_err)?;
        info!(source = %self.location(), count = names.len(), "seed list loaded");
        Ok(names)
    }
}

/// Decodes a JSON array of strings.
pub fn decode_seed_list(bytes: &[u8]) -> Result<Vec<String>, String> {
    serde_json::from_slice::<Vec<String>>(bytes).map_err(|e| e.to_string())
}
