use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::SearchSettings;
use crate::models::SearchResultItem;

/// Largest page the provider will return in one call.
pub const PAGE_SIZE: usize = 10;

/// Errors that can occur while talking to the search provider.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Network-level error during HTTP communication.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Rate limit exceeded")]
    RateLimited,

    /// Invalid API key or search engine ID.
    #[error("Invalid API key or search engine ID")]
    Unauthorized,

    #[error("Invalid response from search provider: {0}")]
    InvalidResponse(String),

    #[error("Search provider error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// One page of results from a search backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// `start` is 1-based; `num` never exceeds [`PAGE_SIZE`].
    async fn fetch_page(
        &self,
        query: &str,
        start: usize,
        num: usize,
    ) -> Result<Vec<SearchResultItem>, SearchError>;
}

#[derive(Debug, Deserialize)]
struct CseResponse {
    #[serde(default)]
    items: Vec<SearchResultItem>,
}

/// Google Custom Search JSON API.
pub struct GoogleCseProvider {
    client: Client,
    base_url: String,
    api_key: String,
    engine_id: String,
}

impl GoogleCseProvider {
    pub fn new(settings: &SearchSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            engine_id: settings.engine_id.clone(),
        })
    }

    // Assembled by hand: the query is already space-substituted and must not be re-escaped.
    fn page_url(&self, query: &str, start: usize, num: usize) -> String {
        format!(
            "{}?key={}&cx={}&q={}&num={}&start={}",
            self.base_url, self.api_key, self.engine_id, query, num, start
        )
    }
}

#[async_trait]
impl SearchProvider for GoogleCseProvider {
    async fn fetch_page(
        &self,
        query: &str,
        start: usize,
        num: usize,
    ) -> Result<Vec<SearchResultItem>, SearchError> {
        let response = self
            .client
            .get(self.page_url(query, start, num))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout
                } else {
                    SearchError::Network(e)
                }
            })?;

        let status = response.status();
        match status {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SearchError::Unauthorized)
            }
            StatusCode::TOO_MANY_REQUESTS => return Err(SearchError::RateLimited),
            _ => {
                let message = response.text().await.unwrap_or_default();
                return Err(SearchError::Api {
                    status: status.as_u16(),
                    message,
                });
            }
        }

        let body = response.text().await?;
        let parsed: CseResponse = serde_json::from_str(&body)
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;
        Ok(parsed.items)
    }
}

#[derive(Clone)]
pub struct SearchService {
    provider: Arc<dyn SearchProvider>,
}

impl SearchService {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }

    /// Collects up to `total` items page by page.
    ///
    /// Stops early once the provider returns an empty page. Any failed page
    /// fails the whole call; items gathered so far are dropped.
    pub async fn fetch_results(
        &self,
        query: &str,
        total: usize,
    ) -> Result<Vec<SearchResultItem>, SearchError> {
        let mut items: Vec<SearchResultItem> = Vec::with_capacity(total);
        let mut start = 1;

        while items.len() < total {
            let num = PAGE_SIZE.min(total - items.len());
            let page = self.provider.fetch_page(query, start, num).await?;
            debug!(start, requested = num, returned = page.len(), "Fetched search page");
            if page.is_empty() {
                break;
            }
            start += page.len();
            items.extend(page);
        }

        items.truncate(total);
        info!(requested = total, returned = items.len(), "Search complete");
        Ok(items)
    }
}
