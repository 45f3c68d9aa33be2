//! Government portal extraction strategy.
//!
//! Handles list-style publication pages on known government domains
//! (legislation trackers, gazette listings, ministry news feeds).

use async_trait::async_trait;
use scraper::Html;
use tracing::debug;

use regmonitor_shared::{RegulatorySource, Result, SourceType};

use super::{DomainPatterns, ExtractionOutcome, ExtractionStrategy, collect_list_items};
use crate::fetcher::PageFetcher;

/// Default list-item selector for government publication pages.
const ITEM_SELECTOR: &str =
    "li.gem-c-document-list__item, article, .publication-item, .document-row, ul.results li";

/// Extracts updates from known government portal domains.
pub struct GovernmentPortalStrategy {
    domains: DomainPatterns,
}

impl GovernmentPortalStrategy {
    pub fn new() -> Self {
        Self {
            domains: DomainPatterns::new(&[
                "*.gov.uk",
                "*.gov",
                "*.europa.eu",
                "*.gc.ca",
                "*.gov.au",
            ]),
        }
    }
}

impl Default for GovernmentPortalStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExtractionStrategy for GovernmentPortalStrategy {
    fn matches(&self, source: &RegulatorySource) -> bool {
        source.source_type == SourceType::Government && self.domains.matches(source.domain())
    }

    async fn extract(
        &self,
        source: &RegulatorySource,
        fetcher: &dyn PageFetcher,
    ) -> Result<ExtractionOutcome> {
        let timeout = source.extraction.fetch_timeout();
        let content = fetcher.fetch(&source.base_url, timeout).await?;

        let candidates = {
            let doc = Html::parse_document(&content.body);
            collect_list_items(&doc, &source.base_url, &source.extraction, ITEM_SELECTOR)
        };

        debug!(
            source = %source.name,
            candidates = candidates.len(),
            "government portal extraction complete"
        );

        Ok(ExtractionOutcome {
            candidates,
            pages_scraped: 1,
        })
    }

    fn name(&self) -> &str {
        "government_portal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::HttpFetcher;
    use url::Url;

    #[tokio::test]
    async fn extracts_publication_list() {
        let html = r#"<html><body><ul class="results">
            <li><a href="/laws/2024-1">Data Protection (Amendment) Regulations 2024</a>
                <p>Amends retention requirements for processors.</p>
                <time datetime="2024-04-02">2 April 2024</time></li>
            <li><a href="/laws/2024-2">Consumer Credit Guidance</a>
                <p>Updated guidance for lenders.</p></li>
        </ul></body></html>"#;

        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(html))
            .mount(&server)
            .await;

        let source = RegulatorySource::new(
            "Gazette",
            "UK",
            SourceType::Government,
            Url::parse(&server.uri()).unwrap(),
        );
        let fetcher = HttpFetcher::new().unwrap();

        let outcome = GovernmentPortalStrategy::new()
            .extract(&source, &fetcher)
            .await
            .expect("extract");

        assert_eq!(outcome.pages_scraped, 1);
        assert_eq!(outcome.candidates.len(), 2);
        assert_eq!(
            outcome.candidates[0].title,
            "Data Protection (Amendment) Regulations 2024"
        );
        assert!(outcome.candidates[0].link.ends_with("/laws/2024-1"));
        assert!(outcome.candidates[0].date.is_some());
        assert!(outcome.candidates[1].date.is_none());
    }

    #[tokio::test]
    async fn empty_page_yields_zero_candidates() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_string("<html><body></body></html>"),
            )
            .mount(&server)
            .await;

        let source = RegulatorySource::new(
            "Empty",
            "UK",
            SourceType::Government,
            Url::parse(&server.uri()).unwrap(),
        );
        let fetcher = HttpFetcher::new().unwrap();

        let outcome = GovernmentPortalStrategy::new()
            .extract(&source, &fetcher)
            .await
            .expect("no-results is not an error");
        assert!(outcome.candidates.is_empty());
    }
}
