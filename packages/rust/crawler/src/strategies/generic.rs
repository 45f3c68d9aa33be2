//! Generic fallback extraction strategy.
//!
//! Works on arbitrary pages by anchoring on headings: each `h2`/`h3` is
//! treated as a candidate title, with the link, description and date taken
//! from the enclosing block. Always matches, so it terminates registry
//! dispatch for sources no specialised strategy claims.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use regmonitor_shared::{ExtractedUpdate, ExtractionConfig, RegulatorySource, Result};

use super::{
    ExtractionOutcome, ExtractionStrategy, collect_list_items, element_date, element_text,
    resolve_link,
};
use crate::fetcher::PageFetcher;

/// Catch-all strategy for sources without a specialised match.
pub struct GenericStrategy;

#[async_trait]
impl ExtractionStrategy for GenericStrategy {
    fn matches(&self, _source: &RegulatorySource) -> bool {
        true
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
            // An explicit item selector switches to list-style extraction;
            // otherwise walk headings.
            if source.extraction.item_selector.is_some() {
                collect_list_items(&doc, &source.base_url, &source.extraction, "article")
            } else {
                heading_candidates(&doc, &source.base_url, &source.extraction)
            }
        };

        debug!(
            source = %source.name,
            candidates = candidates.len(),
            "generic extraction complete"
        );

        Ok(ExtractionOutcome {
            candidates,
            pages_scraped: 1,
        })
    }

    fn name(&self) -> &str {
        "generic"
    }
}

/// Treat each `h2`/`h3` as a candidate title and mine the surrounding
/// block for link, description and date.
fn heading_candidates(
    doc: &Html,
    base_url: &Url,
    cfg: &ExtractionConfig,
) -> Vec<ExtractedUpdate> {
    let heading_sel = Selector::parse("h2, h3").expect("valid selector");
    let link_sel = Selector::parse("a[href]").expect("valid selector");
    let p_sel = Selector::parse("p").expect("valid selector");
    let time_sel = Selector::parse("time").expect("valid selector");

    let mut candidates = Vec::new();
    for heading in doc.select(&heading_sel) {
        let title = element_text(&heading);
        if title.is_empty() {
            continue;
        }

        let block = heading.parent().and_then(ElementRef::wrap);

        // Link: inside the heading itself, else within the enclosing block.
        let link = heading
            .select(&link_sel)
            .next()
            .or_else(|| block.and_then(|b| b.select(&link_sel).next()))
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| resolve_link(base_url, href));
        let Some(link) = link else { continue };

        let description = match cfg
            .description_selector
            .as_deref()
            .and_then(|s| Selector::parse(s).ok())
        {
            Some(sel) => block.and_then(|b| b.select(&sel).next()).map(|el| element_text(&el)),
            None => block.and_then(|b| b.select(&p_sel).next()).map(|el| element_text(&el)),
        }
        .unwrap_or_default();

        let date = match cfg.date_selector.as_deref().and_then(|s| Selector::parse(s).ok()) {
            Some(sel) => block.and_then(|b| b.select(&sel).next()).and_then(|el| element_date(&el)),
            None => block
                .and_then(|b| b.select(&time_sel).next())
                .and_then(|el| element_date(&el)),
        };

        candidates.push(ExtractedUpdate {
            title,
            description,
            link,
            date,
        });
    }
    candidates
}
