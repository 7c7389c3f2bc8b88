// SQLite-backed query cache
// Remembers what the scrape API said for a (mode, query) pair so we don't ask twice

pub mod cache;

pub use cache::{CacheError, CacheManager, CacheStats, EntrySummary};
