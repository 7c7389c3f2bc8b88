// Grant search with cache-first lookup
use crate::{
    cache::QueryCache,
    fetcher::GrantFetcher,
    models::{GrantRecord, SearchMode},
    Error, Result,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a result list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    Cache,
    Remote,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub records: Vec<GrantRecord>,
    pub source: ResultSource,
}

/// Search that checks the query cache before hitting the scrape API
pub struct GrantSearch {
    fetcher: GrantFetcher,
    cache: Option<Arc<dyn QueryCache>>,
}

impl GrantSearch {
    /// No cache: every search goes to the API
    pub fn new(fetcher: GrantFetcher) -> Self {
        Self {
            fetcher,
            cache: None,
        }
    }

    pub fn with_cache(fetcher: GrantFetcher, cache: Arc<dyn QueryCache>) -> Self {
        Self {
            fetcher,
            cache: Some(cache),
        }
    }

    /// Run one search.
    ///
    /// The whole input is trimmed and used as the cache key. On a miss the
    /// API is called and a non-empty answer is written back. Cache trouble
    /// is logged and never fails the search.
    pub async fn search(&self, mode: SearchMode, input: &str) -> Result<SearchOutcome> {
        let query = input.trim();
        if query.is_empty() {
            return Err(Error::EmptyQuery);
        }

        if let Some(cache) = &self.cache {
            debug!("Checking cache for {}:{:?}", mode, query);
            match cache.lookup(mode, query) {
                Ok(Some(records)) => {
                    info!("Cache hit! {} grants for {:?}", records.len(), query);
                    return Ok(SearchOutcome {
                        records,
                        source: ResultSource::Cache,
                    });
                }
                Ok(None) => debug!("Cache miss"),
                Err(e) => warn!("Cache lookup failed, treating as miss: {}", e),
            }
        }

        info!("Fetching from scrape API");
        let records = self.fetcher.fetch(mode, query).await?;

        if let Some(cache) = &self.cache {
            if records.is_empty() {
                debug!("Nothing to cache for {:?}", query);
            } else if let Err(e) = cache.store(mode, query, &records) {
                warn!("Failed to cache results for {:?}: {}", query, e);
            }
        }

        Ok(SearchOutcome {
            records,
            source: ResultSource::Remote,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::MockGrantProvider;
    use grantscout_cache::CacheManager;
    use serde_json::json;

    fn grant(title: &str) -> GrantRecord {
        GrantRecord {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    fn cached_search(provider: MockGrantProvider) -> (GrantSearch, Arc<CacheManager>) {
        let cache = Arc::new(CacheManager::in_memory().unwrap());
        let search = GrantSearch::with_cache(GrantFetcher::new(Box::new(provider)), cache.clone());
        (search, cache)
    }

    struct BrokenCache;

    impl QueryCache for BrokenCache {
        fn lookup(&self, _: SearchMode, _: &str) -> Result<Option<Vec<GrantRecord>>> {
            Err(Error::CacheError("disk on fire".into()))
        }

        fn store(&self, _: SearchMode, _: &str, _: &[GrantRecord]) -> Result<()> {
            Err(Error::CacheError("disk on fire".into()))
        }
    }

    #[tokio::test]
    async fn test_second_search_is_served_from_cache() {
        let mut provider = MockGrantProvider::new();
        provider
            .expect_scrape_keywords()
            .times(1)
            .returning(|_| Ok(json!({ "grants": [{ "Grant name/title": "Solar Fund" }] })));

        let (search, _cache) = cached_search(provider);

        let first = search.search(SearchMode::Keywords, "solar").await.unwrap();
        assert_eq!(first.source, ResultSource::Remote);

        // Surrounding whitespace is trimmed before the cache key is built
        let second = search
            .search(SearchMode::Keywords, "  solar \n")
            .await
            .unwrap();
        assert_eq!(second.source, ResultSource::Cache);
        assert_eq!(second.records, first.records);
    }

    #[tokio::test]
    async fn test_stored_entry_is_returned_without_network() {
        let mut provider = MockGrantProvider::new();
        provider.expect_scrape_url().times(0);

        let (search, cache) = cached_search(provider);
        let stored = vec![grant("AfDB Youth Fund"), grant("AfDB Climate Window")];
        QueryCache::store(
            cache.as_ref(),
            SearchMode::Url,
            "https://www.afdb.org/grants",
            &stored,
        )
        .unwrap();

        let outcome = search
            .search(SearchMode::Url, "https://www.afdb.org/grants")
            .await
            .unwrap();
        assert_eq!(outcome.source, ResultSource::Cache);
        assert_eq!(outcome.records, stored);
    }

    #[tokio::test]
    async fn test_empty_results_are_not_cached() {
        let mut provider = MockGrantProvider::new();
        provider
            .expect_scrape_keywords()
            .times(2)
            .returning(|_| Ok(json!({ "grants": [] })));

        let (search, cache) = cached_search(provider);

        for _ in 0..2 {
            let outcome = search.search(SearchMode::Keywords, "obscure").await.unwrap();
            assert!(outcome.records.is_empty());
            assert_eq!(outcome.source, ResultSource::Remote);
        }
        assert!(cache.entries().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let mut provider = MockGrantProvider::new();
        provider
            .expect_scrape_keywords()
            .times(1)
            .returning(|_| Err(Error::ApiError("timed out".into())));

        let (search, cache) = cached_search(provider);

        let err = search.search(SearchMode::Keywords, "water").await.unwrap_err();
        assert!(matches!(err, Error::ApiError(_)));
        assert!(cache.entries().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_query_makes_no_request() {
        let mut provider = MockGrantProvider::new();
        provider.expect_scrape_keywords().times(0);
        provider.expect_scrape_url().times(0);

        let (search, _cache) = cached_search(provider);

        for mode in [SearchMode::Keywords, SearchMode::Url] {
            let err = search.search(mode, " \n\t ").await.unwrap_err();
            assert!(matches!(err, Error::EmptyQuery));
        }
    }

    #[tokio::test]
    async fn test_cache_failure_falls_back_to_api() {
        let mut provider = MockGrantProvider::new();
        provider
            .expect_scrape_keywords()
            .times(1)
            .returning(|_| Ok(json!({ "grants": [{ "Grant name/title": "Edu Fund" }] })));

        let search = GrantSearch::with_cache(
            GrantFetcher::new(Box::new(provider)),
            Arc::new(BrokenCache),
        );

        let outcome = search.search(SearchMode::Keywords, "education").await.unwrap();
        assert_eq!(outcome.source, ResultSource::Remote);
        assert_eq!(outcome.records, vec![grant("Edu Fund")]);
    }

    #[tokio::test]
    async fn test_without_cache_always_fetches() {
        let mut provider = MockGrantProvider::new();
        provider
            .expect_scrape_keywords()
            .times(2)
            .returning(|_| Ok(json!({ "grants": [{ "Grant name/title": "A" }] })));

        let search = GrantSearch::new(GrantFetcher::new(Box::new(provider)));
        for _ in 0..2 {
            let outcome = search.search(SearchMode::Keywords, "a").await.unwrap();
            assert_eq!(outcome.source, ResultSource::Remote);
        }
    }
}
