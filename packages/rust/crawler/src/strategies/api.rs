//! JSON API extraction strategy.
//!
//! Fetches a JSON endpoint, optionally drills into a configured path
//! expression to find the item list, and follows simple `next`-field
//! pagination up to a bounded page count.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use regmonitor_shared::{ExtractedUpdate, RegulatorySource, Result, SourceType};

use super::{ExtractionOutcome, ExtractionStrategy, parse_date};
use crate::fetcher::PageFetcher;

/// Hard cap on paginated fetches per crawl, regardless of configuration.
const MAX_API_PAGES: u32 = 5;

/// Extracts updates from JSON API sources.
pub struct JsonApiStrategy;

#[async_trait]
impl ExtractionStrategy for JsonApiStrategy {
    fn matches(&self, source: &RegulatorySource) -> bool {
        source.source_type == SourceType::Api
    }

    async fn extract(
        &self,
        source: &RegulatorySource,
        fetcher: &dyn PageFetcher,
    ) -> Result<ExtractionOutcome> {
        let timeout = source.extraction.fetch_timeout();
        let page_limit = source.extraction.max_pages.min(MAX_API_PAGES).max(1);

        let mut candidates = Vec::new();
        let mut pages_scraped = 0u32;
        let mut next_url = Some(source.base_url.clone());

        while let Some(url) = next_url.take() {
            if pages_scraped >= page_limit {
                break;
            }
            if pages_scraped > 0 && source.extraction.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(source.extraction.delay_ms)).await;
            }

            let content = fetcher.fetch(&url, timeout).await?;
            pages_scraped += 1;

            let body: Value = match serde_json::from_str(&content.body) {
                Ok(v) => v,
                Err(e) => {
                    // Malformed response body counts as "nothing found",
                    // not a job failure; the fetch itself succeeded.
                    warn!(source = %source.name, %url, error = %e, "API returned invalid JSON");
                    break;
                }
            };

            let items = find_items(&body, source.extraction.items_path.as_deref());
            for item in items {
                if let Some(candidate) = item_to_candidate(item, &url) {
                    candidates.push(candidate);
                }
            }

            next_url = next_page_url(&body, &url);
        }

        debug!(
            source = %source.name,
            candidates = candidates.len(),
            pages_scraped,
            "API extraction complete"
        );

        Ok(ExtractionOutcome {
            candidates,
            pages_scraped,
        })
    }

    fn name(&self) -> &str {
        "json_api"
    }
}

/// Locate the item array: drill the configured dot-separated path, or try
/// common wrapper keys, or accept a top-level array.
fn find_items<'a>(body: &'a Value, items_path: Option<&str>) -> &'a [Value] {
    let target = match items_path {
        Some(path) => {
            let mut current = body;
            for segment in path.split('.') {
                match current.get(segment) {
                    Some(next) => current = next,
                    None => return &[],
                }
            }
            Some(current)
        }
        None => {
            if body.is_array() {
                Some(body)
            } else {
                ["items", "results", "data", "updates"]
                    .iter()
                    .find_map(|k| body.get(k).filter(|v| v.is_array()))
            }
        }
    };

    target
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Map one JSON object to a candidate. Items without a usable title are skipped.
fn item_to_candidate(item: &Value, page_url: &Url) -> Option<ExtractedUpdate> {
    let title = first_string(item, &["title", "name", "headline"])?;

    let link = first_string(item, &["url", "link", "href"])
        .and_then(|href| page_url.join(&href).ok().map(|u| u.to_string()))
        // Items without their own URL dedup against the endpoint itself.
        .unwrap_or_else(|| page_url.to_string());

    let description = first_string(item, &["description", "summary", "abstract"])
        .unwrap_or_default();

    let date = first_string(item, &["date", "published", "published_at", "published_date"])
        .and_then(|s| parse_date(&s));

    Some(ExtractedUpdate {
        title,
        description,
        link,
        date,
    })
}

/// First non-empty string value among the given keys.
fn first_string(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| item.get(k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Next-page URL from a `next` field, resolved against the current page.
fn next_page_url(body: &Value, current: &Url) -> Option<Url> {
    let next = body
        .get("next")
        .or_else(|| body.get("next_page"))
        .or_else(|| body.get("links").and_then(|l| l.get("next")))
        .and_then(Value::as_str)?;
    current.join(next).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::HttpFetcher;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_source(url: &str) -> RegulatorySource {
        RegulatorySource::new("API", "EU", SourceType::Api, Url::parse(url).unwrap())
    }

    #[test]
    fn find_items_drills_configured_path() {
        let body = json!({"data": {"items": [{"title": "a"}, {"title": "b"}]}});
        assert_eq!(find_items(&body, Some("data.items")).len(), 2);
        assert_eq!(find_items(&body, Some("data.missing")).len(), 0);
    }

    #[test]
    fn find_items_tries_common_wrappers() {
        let body = json!({"results": [{"title": "a"}]});
        assert_eq!(find_items(&body, None).len(), 1);

        let body = json!([{"title": "top-level"}]);
        assert_eq!(find_items(&body, None).len(), 1);

        let body = json!({"nothing": true});
        assert_eq!(find_items(&body, None).len(), 0);
    }

    #[test]
    fn item_mapping_falls_back_to_page_url() {
        let page = Url::parse("https://api.example.gov/updates").unwrap();
        let item = json!({"title": "Untitled rule", "summary": "text"});
        let candidate = item_to_candidate(&item, &page).expect("candidate");
        assert_eq!(candidate.link, "https://api.example.gov/updates");

        let item = json!({"summary": "no title"});
        assert!(item_to_candidate(&item, &page).is_none());
    }

    #[tokio::test]
    async fn extracts_items_from_single_page() {
        let server = MockServer::start().await;
        let body = json!({
            "items": [{
                "title": "New Guidance on Data Retention",
                "url": "https://x/1",
                "summary": "Retention schedules for controllers",
                "published": "2024-02-01"
            }]
        });
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let source = api_source(&server.uri());
        let fetcher = HttpFetcher::new().unwrap();
        let outcome = JsonApiStrategy.extract(&source, &fetcher).await.unwrap();

        assert_eq!(outcome.pages_scraped, 1);
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].title, "New Guidance on Data Retention");
        assert_eq!(outcome.candidates[0].link, "https://x/1");
        assert!(outcome.candidates[0].date.is_some());
    }

    #[tokio::test]
    async fn follows_pagination_up_to_bound() {
        let server = MockServer::start().await;

        // Every page points at the next; the strategy must stop at the cap.
        for n in 0..10 {
            let p = if n == 0 {
                "/".to_string()
            } else {
                format!("/page{n}")
            };
            let body = json!({
                "items": [{"title": format!("Regulation item {n}"), "url": format!("https://x/{n}")}],
                "next": format!("/page{}", n + 1),
            });
            Mock::given(method("GET"))
                .and(path(p))
                .respond_with(ResponseTemplate::new(200).set_body_json(&body))
                .mount(&server)
                .await;
        }

        let source = api_source(&server.uri());
        let fetcher = HttpFetcher::new().unwrap();
        let outcome = JsonApiStrategy.extract(&source, &fetcher).await.unwrap();

        assert_eq!(outcome.pages_scraped, 5);
        assert_eq!(outcome.candidates.len(), 5);
    }

    #[tokio::test]
    async fn invalid_json_yields_zero_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let source = api_source(&server.uri());
        let fetcher = HttpFetcher::new().unwrap();
        let outcome = JsonApiStrategy
            .extract(&source, &fetcher)
            .await
            .expect("parse failure is not a job failure");
        assert!(outcome.candidates.is_empty());
        assert_eq!(outcome.pages_scraped, 1);
    }

    #[tokio::test]
    async fn fetch_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let source = api_source(&server.uri());
        let fetcher = HttpFetcher::new().unwrap();
        assert!(JsonApiStrategy.extract(&source, &fetcher).await.is_err());
    }
}
