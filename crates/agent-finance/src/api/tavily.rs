//! Tavily web search API client

use crate::error::{FinanceError, Result};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

/// A single search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    include_domains: Option<&'a [String]>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

/// Tavily client with rate limiting
#[derive(Clone)]
pub struct TavilyClient {
    client: Client,
    api_key: Option<String>,
    search_depth: String,
    include_domains: Vec<String>,
    rate_limiter: SharedRateLimiter,
}

impl std::fmt::Debug for TavilyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TavilyClient")
            .field("configured", &self.api_key.is_some())
            .field("search_depth", &self.search_depth)
            .finish_non_exhaustive()
    }
}

impl TavilyClient {
    /// Create a new Tavily client
    ///
    /// # Arguments
    /// * `api_key` - Tavily API key; searches fail fatally without one
    /// * `rate_limit` - Requests per minute
    /// * `timeout` - Per-request HTTP timeout
    pub fn new(api_key: Option<String>, rate_limit: u32, timeout: Duration) -> Result<Self> {
        let quota = Quota::per_minute(NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN));
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            search_depth: "basic".to_string(),
            include_domains: Vec::new(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    pub fn with_search_depth(mut self, depth: impl Into<String>) -> Self {
        self.search_depth = depth.into();
        self
    }

    /// Restrict results to the given domains
    pub fn with_include_domains(mut self, domains: Vec<String>) -> Self {
        self.include_domains = domains;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn request<'a>(&'a self, api_key: &'a str, query: &'a str, max_results: usize) -> SearchRequest<'a> {
        SearchRequest {
            api_key,
            query,
            search_depth: &self.search_depth,
            max_results,
            include_domains: (!self.include_domains.is_empty()).then_some(&self.include_domains[..]),
        }
    }

    /// Run a web search
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(FinanceError::ConfigError(
                "TAVILY_API_KEY is not set".to_string(),
            ));
        };

        self.rate_limiter.until_ready().await;
        debug!(query, max_results, "Tavily search");

        let request = self.request(api_key, query, max_results);
        let response = self
            .client
            .post(TAVILY_SEARCH_URL)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FinanceError::HttpStatus {
                provider: "tavily".to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| FinanceError::ApiError(format!("Failed to parse Tavily response: {e}")))?;

        Ok(body.results.into_iter().take(max_results).collect())
    }
}
