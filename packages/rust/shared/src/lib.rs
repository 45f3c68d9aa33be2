//! Shared types, error model, and configuration for regmonitor.
//!
//! This crate is the foundation depended on by all other regmonitor crates.
//! It provides:
//! - [`MonitorError`] — the unified error type
//! - Domain types ([`RegulatorySource`], [`CrawlerJob`], [`RegulatoryUpdate`],
//!   [`ExtractedUpdate`], and the closed enums)
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AssessorConfig, ClassifierConfig, DefaultsConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, resolve_db_path, validate_api_key,
};
pub use error::{MonitorError, Result};
pub use types::{
    CrawlerJob, ExtractedUpdate, ExtractionConfig, ImpactLevel, JobStatus, JobType,
    RegulatorySource, RegulatoryUpdate, SourceId, SourceType, UpdateFrequency, UpdateStatus,
    UpdateType,
};
