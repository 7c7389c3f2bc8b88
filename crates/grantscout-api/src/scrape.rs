use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::retry::{is_retryable_status, with_retry, RetryConfig};

/// Hosted scrape service the grant finder talks to
pub const DEFAULT_BASE_URL: &str = "https://rairo-qxgrants-api.hf.space";

/// Scraping a handful of sites routinely takes a minute or more
const DEFAULT_TIMEOUT_SECS: u64 = 120;

const USER_AGENT: &str = concat!("GrantScout/", env!("CARGO_PKG_VERSION"));

const KEYWORDS_PATH: &str = "scrape";
const URL_PATH: &str = "scrape_url";

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Scrape API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Scrape request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl ScrapeError {
    /// Connection hiccups, timeouts and 5xx/408/429 are worth another go
    pub fn is_retryable(&self) -> bool {
        match self {
            ScrapeError::Status { status, .. } => is_retryable_status(*status),
            ScrapeError::Timeout => true,
            ScrapeError::NetworkError(e) => e.is_connect() || e.is_timeout(),
            ScrapeError::ClientBuild(_) => false,
        }
    }

    fn from_send(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ScrapeError::Timeout
        } else {
            ScrapeError::NetworkError(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Body of `POST /scrape`
#[derive(Debug, Serialize)]
pub struct KeywordScrapeRequest<'a> {
    pub search_terms: &'a [String],
}

/// Body of `POST /scrape_url`
#[derive(Debug, Serialize)]
pub struct UrlScrapeRequest<'a> {
    pub url: &'a str,
}

/// Client for the grant scrape API.
///
/// Both endpoints answer with a JSON object carrying a `grants` array. This
/// client hands the raw body back; picking the grants out and normalizing
/// them is the caller's job.
pub struct ScrapeClient {
    client: reqwest::Client,
    base_url: String,
    retry_config: RetryConfig,
}

impl ScrapeClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Point the client at a different deployment (staging, local mock, ...)
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ScrapeError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_config: RetryConfig::disabled(),
        })
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Scrape grants matching a list of search terms
    pub async fn scrape_keywords(&self, search_terms: &[String]) -> Result<Value> {
        debug!("Scraping {} search term(s)", search_terms.len());
        self.post_json(KEYWORDS_PATH, &KeywordScrapeRequest { search_terms })
            .await
    }

    /// Scrape grants listed on a single page
    pub async fn scrape_url(&self, url: &str) -> Result<Value> {
        debug!("Scraping url {}", url);
        self.post_json(URL_PATH, &UrlScrapeRequest { url }).await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<Value> {
        let url = self.endpoint(path);

        with_retry(&self.retry_config, ScrapeError::is_retryable, || async {
            let response = self
                .client
                .post(&url)
                .json(body)
                .send()
                .await
                .map_err(ScrapeError::from_send)?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ScrapeError::Status {
                    status,
                    body: truncate(&body, 200),
                });
            }

            let text = response.text().await.map_err(ScrapeError::from_send)?;
            Ok(parse_body(&text))
        })
        .await
    }
}

/// A 2xx body that isn't JSON carries no grants; treat it as `null`
fn parse_body(text: &str) -> Value {
    match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!("Scrape API returned a non-JSON body: {}", e);
            Value::Null
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let client =
            ScrapeClient::with_base_url("http://localhost:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.endpoint(KEYWORDS_PATH), "http://localhost:8000/scrape");
        assert_eq!(client.endpoint(URL_PATH), "http://localhost:8000/scrape_url");
    }

    #[test]
    fn test_default_client_targets_hosted_api() {
        let client = ScrapeClient::new().unwrap();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
        assert_eq!(client.retry_config, RetryConfig::disabled());
    }

    #[test]
    fn test_keyword_request_shape() {
        let terms = vec!["Climate Change Research Grants".to_string()];
        let body = serde_json::to_value(KeywordScrapeRequest {
            search_terms: &terms,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({ "search_terms": ["Climate Change Research Grants"] })
        );
    }

    #[test]
    fn test_url_request_shape() {
        let body = serde_json::to_value(UrlScrapeRequest {
            url: "https://www.afdb.org/en/news-and-events/loans-grants",
        })
        .unwrap();
        assert_eq!(
            body,
            json!({ "url": "https://www.afdb.org/en/news-and-events/loans-grants" })
        );
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(r#"{"grants": []}"#), json!({ "grants": [] }));
        assert_eq!(parse_body("<html>busy</html>"), Value::Null);
        assert_eq!(parse_body(""), Value::Null);
    }

    #[test]
    fn test_status_errors_retryability() {
        let server = ScrapeError::Status {
            status: reqwest::StatusCode::BAD_GATEWAY,
            body: String::new(),
        };
        let client = ScrapeError::Status {
            status: reqwest::StatusCode::BAD_REQUEST,
            body: String::new(),
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
        assert!(ScrapeError::Timeout.is_retryable());
        assert!(!ScrapeError::ClientBuild("x".into()).is_retryable());
    }

    /// One-shot HTTP server on loopback: answers the first request with
    /// `status` and `body`, and hands back the raw request body it received.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut chunk = [0u8; 4096];

            let body_start = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed before headers were complete");
                received.extend_from_slice(&chunk[..n]);
                if let Some(pos) = received.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };

            let headers = String::from_utf8_lossy(&received[..body_start]).to_lowercase();
            let content_length: usize = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .map(|v| v.trim().parse().unwrap())
                .unwrap_or(0);

            while received.len() < body_start + content_length {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&chunk[..n]);
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();

            String::from_utf8_lossy(&received[body_start..]).into_owned()
        });

        (base_url, handle)
    }

    fn local_client(base_url: &str) -> ScrapeClient {
        ScrapeClient::with_base_url(base_url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_keyword_scrape_sends_terms_and_returns_body() {
        let (base_url, server) =
            serve_once("200 OK", r#"{"grants":[{"Grant name/title":"Climate Fund"}]}"#).await;

        let terms = vec!["Climate Change Research Grants".to_string()];
        let body = local_client(&base_url).scrape_keywords(&terms).await.unwrap();
        assert_eq!(body, json!({ "grants": [{ "Grant name/title": "Climate Fund" }] }));

        let sent: Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(
            sent,
            json!({ "search_terms": ["Climate Change Research Grants"] })
        );
    }

    #[tokio::test]
    async fn test_url_scrape_sends_url() {
        let (base_url, server) = serve_once("200 OK", r#"{"grants":[]}"#).await;

        let body = local_client(&base_url).scrape_url("www.x.org").await.unwrap();
        assert_eq!(body, json!({ "grants": [] }));

        let sent: Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(sent, json!({ "url": "www.x.org" }));
    }

    #[tokio::test]
    async fn test_server_error_becomes_status_error() {
        let (base_url, server) = serve_once("503 Service Unavailable", "busy").await;

        let err = local_client(&base_url)
            .scrape_keywords(&["water".to_string()])
            .await
            .unwrap_err();
        match err {
            ScrapeError::Status { status, body } => {
                assert_eq!(status, reqwest::StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body, "busy");
            }
            other => panic!("expected status error, got {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_null() {
        let (base_url, server) = serve_once("200 OK", "<html>maintenance</html>").await;

        let body = local_client(&base_url).scrape_url("https://fund.org").await.unwrap();
        assert_eq!(body, Value::Null);
        server.await.unwrap();
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("ééééé", 2), "éé...");
    }
}
