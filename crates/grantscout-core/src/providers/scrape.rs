// Scrape API provider - wraps ScrapeClient so the fetcher can use it
use async_trait::async_trait;
use grantscout_api::{RetryConfig, ScrapeClient};
use serde_json::Value;
use std::time::Duration;
use tracing::error;

use crate::{config::ApiConfig, fetcher::GrantProvider, Result};

/// Wrapper around ScrapeClient that implements GrantProvider
pub struct ScrapeProvider {
    client: ScrapeClient,
}

impl ScrapeProvider {
    pub fn new(client: ScrapeClient) -> Self {
        Self { client }
    }

    /// Build the HTTP client from the `[api]` config section
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let client = ScrapeClient::with_base_url(
            &config.base_url,
            Duration::from_secs(config.timeout_secs.max(1)),
        )?
        .with_retry_config(RetryConfig::with_max_retries(config.max_retries));

        Ok(Self::new(client))
    }
}

#[async_trait]
impl GrantProvider for ScrapeProvider {
    async fn scrape_keywords(&self, terms: &[String]) -> Result<Value> {
        self.client.scrape_keywords(terms).await.map_err(|e| {
            error!("Keyword scrape failed: {}", e);
            e.into()
        })
    }

    async fn scrape_url(&self, url: &str) -> Result<Value> {
        self.client.scrape_url(url).await.map_err(|e| {
            error!("URL scrape failed for {}: {}", url, e);
            e.into()
        })
    }
}
