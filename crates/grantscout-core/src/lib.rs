// Grant search logic: models, cache-first search, session state, export
pub mod cache;
pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod fetcher;
pub mod models;
pub mod providers;
pub mod search;
pub mod session;

pub use cache::QueryCache;
pub use config::Config;
pub use error::Error;
pub use export::{ExportFormat, Exporter};
pub use fetcher::{GrantFetcher, GrantProvider};
pub use models::{GrantRecord, GrantValue, SearchMode};
pub use search::{GrantSearch, ResultSource, SearchOutcome};
pub use session::{Notice, SearchSession, SessionState};

/// Result type alias because typing Result<T, Error> everywhere is tedious
pub type Result<T> = std::result::Result<T, Error>;
