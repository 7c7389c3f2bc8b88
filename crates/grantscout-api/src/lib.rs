// HTTP client for the grant scrape API
pub mod retry;
pub mod scrape;

// Re-export common types
pub use retry::RetryConfig;
pub use scrape::{ScrapeClient, ScrapeError, DEFAULT_BASE_URL};
