//! Extraction strategy trait and built-in per-source-type strategies.
//!
//! Strategies turn a source's fetched content into raw candidate updates.
//! The registry tries strategies in priority order keyed by
//! `(source type, domain pattern)`; [`GenericStrategy`] is the always-last
//! fallback. Strategies never error on "no items found" — they error only
//! on unrecoverable fetch failure, which the job lifecycle manager turns
//! into a failed job.

mod api;
mod generic;
mod government;
mod regulator;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use regmonitor_shared::{ExtractedUpdate, ExtractionConfig, RegulatorySource, Result};

use crate::fetcher::PageFetcher;

pub use api::JsonApiStrategy;
pub use generic::GenericStrategy;
pub use government::GovernmentPortalStrategy;
pub use regulator::RegulatorNewsStrategy;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Result of one strategy run over a source.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    /// Raw candidates, before relevance filtering.
    pub candidates: Vec<ExtractedUpdate>,
    /// Pages fetched during extraction (for job accounting).
    pub pages_scraped: u32,
}

/// Per-source-type extraction algorithm.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Whether this strategy should handle the given source.
    fn matches(&self, source: &RegulatorySource) -> bool;

    /// Fetch and extract raw candidate updates.
    async fn extract(
        &self,
        source: &RegulatorySource,
        fetcher: &dyn PageFetcher,
    ) -> Result<ExtractionOutcome>;

    /// Human-readable strategy name for tracing.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds registered strategies in priority order.
pub struct StrategyRegistry {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl StrategyRegistry {
    /// Create a registry with all built-in strategies
    /// (domain-specific first, generic last).
    pub fn new() -> Self {
        Self {
            strategies: vec![
                Box::new(GovernmentPortalStrategy::new()),
                Box::new(RegulatorNewsStrategy::new()),
                Box::new(JsonApiStrategy),
                Box::new(GenericStrategy),
            ],
        }
    }

    /// Select the best strategy for the given source.
    /// Always returns a strategy (GenericStrategy is the fallback).
    pub fn select(&self, source: &RegulatorySource) -> &dyn ExtractionStrategy {
        for strategy in &self.strategies {
            if strategy.matches(source) {
                return strategy.as_ref();
            }
        }
        // Unreachable: GenericStrategy always matches
        unreachable!("GenericStrategy must always match");
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Domain patterns
// ---------------------------------------------------------------------------

/// A set of glob-style domain patterns (e.g., `*.gov.uk`).
pub(crate) struct DomainPatterns {
    patterns: Vec<regex::Regex>,
}

impl DomainPatterns {
    pub(crate) fn new(globs: &[&str]) -> Self {
        Self {
            patterns: globs.iter().filter_map(|g| glob_to_regex(g)).collect(),
        }
    }

    pub(crate) fn matches(&self, domain: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(domain))
    }
}

/// Convert a glob-like domain pattern to a regex.
fn glob_to_regex(pattern: &str) -> Option<regex::Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\*\*", ".*")
        .replace(r"\*", "[^.]*(?:\\.[^.]*)*");
    regex::Regex::new(&format!("^{escaped}$")).ok()
}

// ---------------------------------------------------------------------------
// Shared DOM helpers
// ---------------------------------------------------------------------------

/// Collect candidate updates from list-like elements of a document.
///
/// Used by the government and regulator strategies with different default
/// item selectors; selector overrides from the source's extraction config
/// take precedence.
pub(crate) fn collect_list_items(
    doc: &Html,
    base_url: &Url,
    cfg: &ExtractionConfig,
    default_item_selector: &str,
) -> Vec<ExtractedUpdate> {
    let item_sel = cfg
        .item_selector
        .as_deref()
        .and_then(|s| Selector::parse(s).ok())
        .unwrap_or_else(|| {
            Selector::parse(default_item_selector).expect("default item selector is valid")
        });

    let mut candidates = Vec::new();
    for item in doc.select(&item_sel) {
        if let Some(candidate) = item_to_candidate(&item, base_url, cfg) {
            candidates.push(candidate);
        }
    }
    candidates
}

/// Extract `{title, description, link, date}` from one list item.
/// Returns `None` when no usable title/link can be found.
pub(crate) fn item_to_candidate(
    item: &ElementRef<'_>,
    base_url: &Url,
    cfg: &ExtractionConfig,
) -> Option<ExtractedUpdate> {
    let link_sel = Selector::parse("a[href]").expect("valid selector");
    let link_el = item.select(&link_sel).next();

    let title = match cfg.title_selector.as_deref().and_then(|s| Selector::parse(s).ok()) {
        Some(sel) => item.select(&sel).next().map(|el| element_text(&el)),
        None => link_el
            .map(|el| element_text(&el))
            .filter(|t| !t.is_empty())
            .or_else(|| heading_text(item)),
    }
    .filter(|t| !t.is_empty())?;

    let link = link_el
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| resolve_link(base_url, href))?;

    let description = match cfg
        .description_selector
        .as_deref()
        .and_then(|s| Selector::parse(s).ok())
    {
        Some(sel) => item.select(&sel).next().map(|el| element_text(&el)),
        None => {
            let p_sel = Selector::parse("p").expect("valid selector");
            item.select(&p_sel).next().map(|el| element_text(&el))
        }
    }
    .unwrap_or_default();

    let date = match cfg.date_selector.as_deref().and_then(|s| Selector::parse(s).ok()) {
        Some(sel) => item.select(&sel).next().and_then(|el| element_date(&el)),
        None => {
            let time_sel = Selector::parse("time").expect("valid selector");
            item.select(&time_sel).next().and_then(|el| element_date(&el))
        }
    };

    Some(ExtractedUpdate {
        title,
        description,
        link,
        date,
    })
}

/// Collapsed, trimmed text content of an element.
pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// First heading text within an element, if any.
fn heading_text(el: &ElementRef<'_>) -> Option<String> {
    let h_sel = Selector::parse("h1, h2, h3, h4").expect("valid selector");
    el.select(&h_sel)
        .next()
        .map(|h| element_text(&h))
        .filter(|t| !t.is_empty())
}

/// Resolve a possibly-relative href against the base URL.
/// Skips anchors, javascript: and mailto: links.
pub(crate) fn resolve_link(base_url: &Url, href: &str) -> Option<String> {
    if href.starts_with('#') || href.starts_with("javascript:") || href.starts_with("mailto:") {
        return None;
    }
    let mut resolved = base_url.join(href).ok()?;
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

/// Parse a date from an element: `datetime` attribute first, then text.
pub(crate) fn element_date(el: &ElementRef<'_>) -> Option<DateTime<Utc>> {
    if let Some(dt) = el.value().attr("datetime").and_then(parse_date) {
        return Some(dt);
    }
    parse_date(&element_text(el))
}

/// Lenient date parsing: RFC 3339, ISO date, or long-form day/month/year.
pub(crate) fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d", "%d %B %Y", "%B %d, %Y", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}
