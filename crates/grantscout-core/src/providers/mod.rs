// Provider implementations - bridges API clients with the GrantProvider trait
pub mod scrape;

pub use scrape::ScrapeProvider;
