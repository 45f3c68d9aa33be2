//! Regulator news extraction strategy.
//!
//! Known regulator sites publish updates under a dedicated news sub-path;
//! this strategy targets that listing directly rather than the landing page.

use async_trait::async_trait;
use scraper::Html;
use tracing::debug;
use url::Url;

use regmonitor_shared::{RegulatorySource, Result, SourceType};

use super::{DomainPatterns, ExtractionOutcome, ExtractionStrategy, collect_list_items};
use crate::fetcher::PageFetcher;

/// Default item selector for regulator news listings.
const ITEM_SELECTOR: &str = ".news-item, .listing-item, article, .search-result, ul.news li";

/// News sub-path appended when the source points at a site root.
const NEWS_PATH: &str = "news/";

/// Extracts updates from known regulator news sections.
pub struct RegulatorNewsStrategy {
    domains: DomainPatterns,
}

impl RegulatorNewsStrategy {
    pub fn new() -> Self {
        Self {
            domains: DomainPatterns::new(&[
                "ico.org.uk",
                "fca.org.uk",
                "edpb.europa.eu",
                "cnil.fr",
                "*.bafin.de",
                "dataprotection.ie",
            ]),
        }
    }

    /// Listing URL for a source: its base URL, or the news sub-path
    /// when the base URL is a bare site root.
    fn listing_url(source: &RegulatorySource) -> Url {
        if source.base_url.path() == "/" {
            source
                .base_url
                .join(NEWS_PATH)
                .unwrap_or_else(|_| source.base_url.clone())
        } else {
            source.base_url.clone()
        }
    }
}

impl Default for RegulatorNewsStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExtractionStrategy for RegulatorNewsStrategy {
    fn matches(&self, source: &RegulatorySource) -> bool {
        source.source_type == SourceType::Regulator && self.domains.matches(source.domain())
    }

    async fn extract(
        &self,
        source: &RegulatorySource,
        fetcher: &dyn PageFetcher,
    ) -> Result<ExtractionOutcome> {
        let url = Self::listing_url(source);
        let timeout = source.extraction.fetch_timeout();
        let content = fetcher.fetch(&url, timeout).await?;

        let candidates = {
            let doc = Html::parse_document(&content.body);
            collect_list_items(&doc, &url, &source.extraction, ITEM_SELECTOR)
        };

        debug!(
            source = %source.name,
            url = %url,
            candidates = candidates.len(),
            "regulator news extraction complete"
        );

        Ok(ExtractionOutcome {
            candidates,
            pages_scraped: 1,
        })
    }

    fn name(&self) -> &str {
        "regulator_news"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_url_appends_news_path_to_root() {
        let source = RegulatorySource::new(
            "ICO",
            "UK",
            SourceType::Regulator,
            Url::parse("https://ico.org.uk/").unwrap(),
        );
        assert_eq!(
            RegulatorNewsStrategy::listing_url(&source).as_str(),
            "https://ico.org.uk/news/"
        );
    }

    #[test]
    fn listing_url_keeps_explicit_path() {
        let source = RegulatorySource::new(
            "EDPB",
            "EU",
            SourceType::Regulator,
            Url::parse("https://edpb.europa.eu/news/news_en").unwrap(),
        );
        assert_eq!(
            RegulatorNewsStrategy::listing_url(&source).as_str(),
            "https://edpb.europa.eu/news/news_en"
        );
    }

    #[tokio::test]
    async fn extracts_news_items() {
        let html = r#"<html><body>
            <div class="news-item">
                <h3><a href="/news/fine-2024">Regulator fines processor for breach</a></h3>
                <p>Monetary penalty notice issued under data protection law.</p>
                <time datetime="2024-03-11">11 March 2024</time>
            </div>
        </body></html>"#;

        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(html))
            .mount(&server)
            .await;

        let source = RegulatorySource::new(
            "Reg",
            "UK",
            SourceType::Regulator,
            Url::parse(&format!("{}/newsroom", server.uri())).unwrap(),
        );
        let fetcher = crate::fetcher::HttpFetcher::new().unwrap();

        let outcome = RegulatorNewsStrategy::new()
            .extract(&source, &fetcher)
            .await
            .expect("extract");
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(
            outcome.candidates[0].title,
            "Regulator fines processor for breach"
        );
        assert!(
            outcome.candidates[0]
                .description
                .contains("Monetary penalty")
        );
    }
}
