//! One user's search session: what is on screen and what happens next.
//!
//! States: `Idle -> Loading -> Displaying`, back to `Idle` on a failed or
//! empty submission. Each search start bumps a generation counter and a
//! completion only lands if it carries the current generation, so a slow
//! response can never overwrite a newer one.

use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::{
    display::NO_RESULTS,
    export::{ExportFormat, Exporter},
    models::{GrantRecord, SearchMode},
    search::{GrantSearch, ResultSource, SearchOutcome},
    Error, Result,
};

/// Shown for any API failure; the real cause only goes to the log
pub const FETCH_FAILED: &str = "Failed to fetch grant data.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Loading,
    Displaying,
}

/// Transient message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Warning(String),
    Error(String),
}

/// Handed out by [`SearchSession::begin`], given back to [`SearchSession::finish`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTicket {
    pub generation: u64,
    pub mode: SearchMode,
}

/// Whether an Enter press submits. URL input is one line, so Enter always
/// submits; keyword input is one term per line, so it takes a modifier.
pub fn should_submit(mode: SearchMode, modifier_held: bool) -> bool {
    match mode {
        SearchMode::Url => true,
        SearchMode::Keywords => modifier_held,
    }
}

#[derive(Debug, Default)]
pub struct SearchSession {
    mode: SearchMode,
    state: SessionState,
    displayed: Vec<GrantRecord>,
    generation: u64,
    last_source: Option<ResultSource>,
}

impl SearchSession {
    pub fn new(mode: SearchMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: SearchMode) {
        self.mode = mode;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Records currently on screen
    pub fn results(&self) -> &[GrantRecord] {
        &self.displayed
    }

    pub fn last_source(&self) -> Option<ResultSource> {
        self.last_source
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a search; any search still in flight becomes stale
    pub fn begin(&mut self) -> SearchTicket {
        self.generation += 1;
        self.state = SessionState::Loading;
        SearchTicket {
            generation: self.generation,
            mode: self.mode,
        }
    }

    /// Apply a finished search. Stale tickets are ignored and yield no notice.
    pub fn finish(&mut self, ticket: SearchTicket, result: Result<SearchOutcome>) -> Option<Notice> {
        if ticket.generation != self.generation {
            debug!(
                "Dropping result of superseded search #{} (current #{})",
                ticket.generation, self.generation
            );
            return None;
        }

        match result {
            Ok(outcome) => {
                self.displayed = outcome.records;
                self.last_source = Some(outcome.source);
                self.state = SessionState::Displaying;
                if self.displayed.is_empty() {
                    Some(Notice::Info(NO_RESULTS.to_string()))
                } else {
                    None
                }
            }
            Err(Error::EmptyQuery) => {
                // Nothing was sent; whatever was on screen stays there
                self.state = SessionState::Idle;
                Some(Notice::Warning(Error::EmptyQuery.to_string()))
            }
            Err(e) => {
                error!("Error fetching grants: {}", e);
                self.displayed.clear();
                self.last_source = None;
                self.state = SessionState::Idle;
                Some(Notice::Error(FETCH_FAILED.to_string()))
            }
        }
    }

    /// Begin, run and finish one search in the current mode
    pub async fn submit(&mut self, search: &GrantSearch, input: &str) -> Option<Notice> {
        let ticket = self.begin();
        let result = search.search(ticket.mode, input).await;
        self.finish(ticket, result)
    }

    /// Write what is on screen; `Error::EmptyExport` when nothing is
    pub fn export_to(&self, path: &Path, format: ExportFormat) -> Result<PathBuf> {
        Exporter::export_to_file_with_format(&self.displayed, path, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{GrantFetcher, MockGrantProvider};
    use serde_json::json;

    fn grant(title: &str) -> GrantRecord {
        GrantRecord {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    fn outcome(titles: &[&str]) -> Result<SearchOutcome> {
        Ok(SearchOutcome {
            records: titles.iter().map(|t| grant(t)).collect(),
            source: ResultSource::Remote,
        })
    }

    #[test]
    fn test_fresh_session_is_idle() {
        let session = SearchSession::new(SearchMode::Url);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.mode(), SearchMode::Url);
        assert!(session.results().is_empty());
    }

    #[test]
    fn test_success_displays_results() {
        let mut session = SearchSession::default();
        let ticket = session.begin();
        assert_eq!(session.state(), SessionState::Loading);

        let notice = session.finish(ticket, outcome(&["A", "B"]));
        assert_eq!(notice, None);
        assert_eq!(session.state(), SessionState::Displaying);
        assert_eq!(session.results().len(), 2);
        assert_eq!(session.last_source(), Some(ResultSource::Remote));
    }

    #[test]
    fn test_zero_results_is_still_displaying() {
        let mut session = SearchSession::default();
        let ticket = session.begin();
        let notice = session.finish(ticket, outcome(&[]));
        assert_eq!(notice, Some(Notice::Info(NO_RESULTS.to_string())));
        assert_eq!(session.state(), SessionState::Displaying);
    }

    #[test]
    fn test_stale_completion_is_dropped() {
        let mut session = SearchSession::default();
        let slow = session.begin();
        let fast = session.begin();

        assert_eq!(session.finish(fast, outcome(&["newer"])), None);
        assert_eq!(session.finish(slow, outcome(&["older", "stale"])), None);

        assert_eq!(session.results(), &[grant("newer")]);
        assert_eq!(session.state(), SessionState::Displaying);
    }

    #[test]
    fn test_stale_failure_does_not_clear_results() {
        let mut session = SearchSession::default();
        let slow = session.begin();
        let fast = session.begin();
        session.finish(fast, outcome(&["kept"]));

        let notice = session.finish(slow, Err(Error::ApiError("502".into())));
        assert_eq!(notice, None);
        assert_eq!(session.results(), &[grant("kept")]);
    }

    #[test]
    fn test_fetch_error_clears_results() {
        let mut session = SearchSession::default();
        let first = session.begin();
        session.finish(first, outcome(&["A"]));

        let second = session.begin();
        let notice = session.finish(second, Err(Error::ApiError("connection reset".into())));

        assert_eq!(notice, Some(Notice::Error(FETCH_FAILED.to_string())));
        assert!(session.results().is_empty());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_empty_query_keeps_results() {
        let mut session = SearchSession::default();
        let first = session.begin();
        session.finish(first, outcome(&["A"]));

        let second = session.begin();
        let notice = session.finish(second, Err(Error::EmptyQuery));

        assert_eq!(
            notice,
            Some(Notice::Warning("Please enter search terms or a URL.".to_string()))
        );
        assert_eq!(session.results(), &[grant("A")]);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_export_needs_results() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("grants.csv");

        let mut session = SearchSession::default();
        assert!(matches!(
            session.export_to(&path, ExportFormat::Csv),
            Err(Error::EmptyExport)
        ));
        assert!(!path.exists());

        let ticket = session.begin();
        session.finish(ticket, outcome(&["A"]));
        let written = session.export_to(&path, ExportFormat::Csv).unwrap();
        let csv = std::fs::read_to_string(written).unwrap();
        assert_eq!(csv.lines().count(), 2);
    }

    #[test]
    fn test_submit_key_rule() {
        assert!(should_submit(SearchMode::Url, false));
        assert!(should_submit(SearchMode::Url, true));
        assert!(!should_submit(SearchMode::Keywords, false));
        assert!(should_submit(SearchMode::Keywords, true));
    }

    #[tokio::test]
    async fn test_submit_runs_search_in_session_mode() {
        let mut provider = MockGrantProvider::new();
        provider.expect_scrape_keywords().times(0);
        provider
            .expect_scrape_url()
            .times(1)
            .returning(|_| Ok(json!({ "grants": [{ "Grant name/title": "From URL" }] })));
        let search = GrantSearch::new(GrantFetcher::new(Box::new(provider)));

        let mut session = SearchSession::new(SearchMode::Url);
        let notice = session.submit(&search, " https://fund.org/calls ").await;

        assert_eq!(notice, None);
        assert_eq!(session.results(), &[grant("From URL")]);
        assert_eq!(session.generation(), 1);
    }

    #[tokio::test]
    async fn test_submit_blank_sends_nothing() {
        let mut provider = MockGrantProvider::new();
        provider.expect_scrape_keywords().times(0);
        provider.expect_scrape_url().times(0);
        let search = GrantSearch::new(GrantFetcher::new(Box::new(provider)));

        let mut session = SearchSession::default();
        let notice = session.submit(&search, "   ").await;
        assert!(matches!(notice, Some(Notice::Warning(_))));
        assert_eq!(session.state(), SessionState::Idle);
    }
}
