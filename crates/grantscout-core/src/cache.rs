// Query cache seam - the search only needs lookup + store
use crate::{
    models::{GrantRecord, SearchMode},
    Result,
};
use grantscout_cache::CacheManager;

/// Persistent mapping from (mode, trimmed query) to a fetched result list
///
/// Implemented by the SQLite `CacheManager`; tests and embedders can plug
/// in their own store.
pub trait QueryCache: Send + Sync {
    /// Results of the first entry stored for this exact key
    fn lookup(&self, mode: SearchMode, query: &str) -> Result<Option<Vec<GrantRecord>>>;

    /// Append an entry. Callers only store non-empty result lists.
    fn store(&self, mode: SearchMode, query: &str, results: &[GrantRecord]) -> Result<()>;
}

impl QueryCache for CacheManager {
    fn lookup(&self, mode: SearchMode, query: &str) -> Result<Option<Vec<GrantRecord>>> {
        Ok(CacheManager::lookup(self, mode.as_str(), query)?)
    }

    fn store(&self, mode: SearchMode, query: &str, results: &[GrantRecord]) -> Result<()> {
        CacheManager::store(self, mode.as_str(), query, results)?;
        Ok(())
    }
}
