//! Page fetcher: the boundary between the pipeline and the network.
//!
//! The [`PageFetcher`] trait lets tests substitute a deterministic fetcher;
//! [`HttpFetcher`] is the production implementation backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::debug;
use url::Url;

use regmonitor_shared::{MonitorError, Result};

/// User-Agent string for crawl requests.
const USER_AGENT: &str = concat!("regmonitor/", env!("CARGO_PKG_VERSION"));

/// A fetched page body with response metadata.
#[derive(Debug, Clone)]
pub struct FetchedContent {
    /// Final URL after redirects.
    pub url: Url,
    /// Raw response body (HTML or JSON).
    pub body: String,
    pub status_code: u16,
    pub fetched_at: DateTime<Utc>,
}

/// Fetches a URL into its rendered content, with a per-call timeout.
///
/// Implementations must return an error for network failures, timeouts,
/// and non-success status codes; an empty body is not an error.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedContent>;
}

/// Production fetcher backed by a shared `reqwest` client.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher with the crawler User-Agent and bounded redirects.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| MonitorError::Fetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedContent> {
        debug!(%url, timeout_ms = timeout.as_millis() as u64, "fetching page");

        let response = self
            .client
            .get(url.as_str())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| MonitorError::Fetch(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::Fetch(format!("{url}: HTTP {status}")));
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| MonitorError::Fetch(format!("{url}: body read failed: {e}")))?;

        Ok(FetchedContent {
            url: final_url,
            body,
            status_code: status.as_u16(),
            fetched_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_success() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/news"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_string("<html>updates</html>"),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let url = Url::parse(&format!("{}/news", server.uri())).unwrap();
        let content = fetcher
            .fetch(&url, Duration::from_secs(5))
            .await
            .expect("fetch");
        assert_eq!(content.status_code, 200);
        assert!(content.body.contains("updates"));
    }

    #[tokio::test]
    async fn fetch_non_success_status_is_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let url = Url::parse(&server.uri()).unwrap();
        let err = fetcher
            .fetch(&url, Duration::from_secs(5))
            .await
            .expect_err("should fail");
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn fetch_timeout_is_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(5))
                    .set_body_string("slow"),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let url = Url::parse(&server.uri()).unwrap();
        let result = fetcher.fetch(&url, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(MonitorError::Fetch(_))));
    }
}
