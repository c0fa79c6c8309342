// # HTTP Scope Feed
//
// This crate provides the HTTP-based scope feed for scopewatch.
//
// ## Purpose
//
// Downloads the published list of bug bounty programs (by default the
// HackerOne dump maintained in `arkadiyt/bounty-targets-data`) and hands the
// raw bytes to the core, which decodes and validates them.
//
// ## Architecture
//
// One GET per cycle. No caching, no conditional requests: the document is
// small enough and the core needs the whole thing every time.

use scopewatch_core::config::{DEFAULT_FEED_URL, ScopeConfig};
use scopewatch_core::traits::ScopeFeed;
use scopewatch_core::{Error, Result};

use std::time::Duration;

/// Default request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Scope feed fetched over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpScopeFeed {
    /// URL of the feed document
    url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpScopeFeed {
    /// Create a feed for `url`
    ///
    /// # Parameters
    ///
    /// - `url`: location of the JSON program list
    /// - `timeout`: upper bound on one request, body included
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("scopewatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Create a feed from the scope pipeline configuration
    pub fn from_config(config: &ScopeConfig) -> Result<Self> {
        Self::new(config.feed_url.clone(), config.fetch_timeout())
    }

    /// The feed URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Default for HttpScopeFeed {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait::async_trait]
impl ScopeFeed for HttpScopeFeed {
    async fn fetch(&self) -> Result<Vec<u8>> {
        tracing::debug!("Fetching scope feed from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::feed(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::feed(format!(
                "{} answered {}",
                self.url,
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::feed(format!("Failed to read response: {}", e)))?;

        tracing::debug!("Scope feed is {} bytes", body.len());
        Ok(body.to_vec())
    }

    fn feed_name(&self) -> &'static str {
        "http"
    }
}
