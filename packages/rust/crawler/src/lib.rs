//! Crawling layer: page fetching and per-source-type extraction.
//!
//! The crawler turns a [`regmonitor_shared::RegulatorySource`] into raw
//! candidate updates. [`fetcher::PageFetcher`] is the network boundary;
//! [`strategies::StrategyRegistry`] dispatches to the extraction strategy
//! matching the source's type and domain.

pub mod fetcher;
pub mod strategies;

pub use fetcher::{FetchedContent, HttpFetcher, PageFetcher};
pub use strategies::{
    ExtractionOutcome, ExtractionStrategy, GenericStrategy, GovernmentPortalStrategy,
    JsonApiStrategy, RegulatorNewsStrategy, StrategyRegistry,
};
