use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    models::{grants_from_response, GrantRecord, SearchMode},
    Error, Result,
};

/// Something that can run a scrape and hand back the raw response body.
///
/// The HTTP client sits behind this so searches can be tested without a
/// network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GrantProvider: Send + Sync {
    async fn scrape_keywords(&self, terms: &[String]) -> Result<Value>;
    async fn scrape_url(&self, url: &str) -> Result<Value>;
}

/// Turns user input into scrape requests and scrape responses into records
pub struct GrantFetcher {
    provider: Box<dyn GrantProvider>,
}

impl GrantFetcher {
    pub fn new(provider: Box<dyn GrantProvider>) -> Self {
        Self { provider }
    }

    /// Fetch for the given mode. `query` is the already-trimmed user input.
    pub async fn fetch(&self, mode: SearchMode, query: &str) -> Result<Vec<GrantRecord>> {
        match mode {
            SearchMode::Keywords => self.fetch_by_keywords(query).await,
            SearchMode::Url => self.fetch_by_url(query).await,
        }
    }

    /// One term per non-blank line, all sent in a single request
    pub async fn fetch_by_keywords(&self, text: &str) -> Result<Vec<GrantRecord>> {
        let terms = split_terms(text);
        if terms.is_empty() {
            return Err(Error::EmptyQuery);
        }

        info!("Fetching grants for {} term(s)", terms.len());
        let body = self.provider.scrape_keywords(&terms).await?;
        let grants = grants_from_response(&body);
        debug!("Scrape returned {} grants", grants.len());
        Ok(grants)
    }

    pub async fn fetch_by_url(&self, url: &str) -> Result<Vec<GrantRecord>> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::EmptyQuery);
        }

        info!("Fetching grants listed at {}", url);
        let body = self.provider.scrape_url(url).await?;
        let grants = grants_from_response(&body);
        debug!("Scrape returned {} grants", grants.len());
        Ok(grants)
    }
}

/// Split multi-line keyword input into trimmed, non-empty terms
pub fn split_terms(text: &str) -> Vec<String> {
    text.split('\n')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}
