use thiserror::Error;

/// All the ways a grant search can go wrong
///
/// `EmptyQuery` and `EmptyExport` are user mistakes and get a gentle
/// warning. `ApiError` is anything the scrape service did to us; the user
/// only ever sees a generic message for it, the details go to the log.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Please enter search terms or a URL.")]
    EmptyQuery,

    #[error("No results to export.")]
    EmptyExport,

    #[error("Scrape API request failed: {0}")]
    ApiError(String),

    #[error("Cache operation failed: {0}")]
    CacheError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<grantscout_cache::CacheError> for Error {
    fn from(err: grantscout_cache::CacheError) -> Self {
        Error::CacheError(err.to_string())
    }
}

impl From<grantscout_api::ScrapeError> for Error {
    fn from(err: grantscout_api::ScrapeError) -> Self {
        Error::ApiError(err.to_string())
    }
}
