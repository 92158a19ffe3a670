//! Web search using the Brave Search API

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Brave Search API configuration
const API_URL: &str = "https://api.search.brave.com/res/v1/web/search";
const DEFAULT_RESULT_COUNT: u32 = 5;
const MAX_RESULT_COUNT: u32 = 20;
const SEARCH_TIMEOUT_SECS: u64 = 25;

/// Search-related errors
#[derive(Debug, Error)]
pub enum SearchError {
    /// HTTP request failed
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// API returned an error
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Request timed out
    #[error("request timed out")]
    Timeout,

    /// Failed to parse response
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// No results found
    #[error("no results found")]
    NoResults,
}

/// Result type for search operations
pub type Result<T> = std::result::Result<T, SearchError>;

/// Web search parameters, as the model passes them to the tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebSearchParams {
    /// Search query
    pub query: String,

    /// Country code for results, e.g. `JP`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    /// Maximum number of results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    /// Search language, e.g. `ja`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_lang: Option<String>,
}

impl WebSearchParams {
    /// Create new web search params with just a query
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

/// Defaults applied when the caller leaves a parameter unset
#[derive(Debug, Clone, Default)]
pub struct SearchDefaults {
    pub country: Option<String>,
    pub search_lang: Option<String>,
    pub count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
}

/// Search result
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The formatted results
    pub output: String,

    /// Number of results included
    pub count: usize,
}

/// Brave Search client
#[derive(Debug, Clone)]
pub struct BraveSearch {
    http: reqwest::Client,
    api_key: String,
    url: String,
    defaults: SearchDefaults,
}

impl BraveSearch {
    /// Create a client with a subscription token
    #[must_use]
    pub fn new(api_key: impl Into<String>, defaults: SearchDefaults) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            url: API_URL.to_string(),
            defaults,
        }
    }

    /// Point the client at a different endpoint
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Run a web search
    ///
    /// # Errors
    ///
    /// Returns error if request fails, times out, or no results found
    pub async fn web_search(&self, params: WebSearchParams) -> Result<SearchResult> {
        let query = self.query_pairs(params);
        tracing::debug!(?query, "brave web search");

        let response = tokio::time::timeout(
            Duration::from_secs(SEARCH_TIMEOUT_SECS),
            self.http
                .get(&self.url)
                .header("accept", "application/json")
                .header("X-Subscription-Token", &self.api_key)
                .query(&query)
                .send(),
        )
        .await
        .map_err(|_| SearchError::Timeout)?
        .map_err(SearchError::Request)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::Api { status, message });
        }

        let text = response.text().await.map_err(SearchError::Request)?;
        parse_response(&text)
    }

    fn query_pairs(&self, params: WebSearchParams) -> Vec<(&'static str, String)> {
        let count = params
            .count
            .or(self.defaults.count)
            .unwrap_or(DEFAULT_RESULT_COUNT)
            .clamp(1, MAX_RESULT_COUNT);

        let mut pairs = vec![("q", params.query), ("count", count.to_string())];
        if let Some(country) = params.country.or_else(|| self.defaults.country.clone()) {
            pairs.push(("country", country));
        }
        if let Some(lang) = params
            .search_lang
            .or_else(|| self.defaults.search_lang.clone())
        {
            pairs.push(("search_lang", lang));
        }
        pairs
    }
}

/// Format a Brave response body as text blocks
fn parse_response(text: &str) -> Result<SearchResult> {
    let response: BraveResponse =
        serde_json::from_str(text).map_err(|e| SearchError::Parse(e.to_string()))?;

    let results = response.web.map(|web| web.results).unwrap_or_default();
    if results.is_empty() {
        return Err(SearchError::NoResults);
    }

    let output = results
        .iter()
        .map(|r| {
            format!(
                "Title: {}\nDescription: {}\nURL: {}",
                r.title, r.description, r.url
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    Ok(SearchResult {
        output,
        count: results.len(),
    })
}
