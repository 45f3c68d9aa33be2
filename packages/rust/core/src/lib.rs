//! Pipeline orchestration for regmonitor.
//!
//! Wires the crawler, storage, classification, and notification layers
//! into the monitoring pipeline:
//!
//! 1. [`scheduler::Scheduler`] finds due sources and bounds concurrency
//! 2. [`pipeline::Monitor`] runs one source through extraction,
//!    [`filter`]-based relevance checks, [`classify`] (LLM with rule
//!    fallback), [`dedup`], persistence, and [`notify`] fan-out
//! 3. [`job::JobLifecycle`] records every attempt and feeds reliability
//!    back to the source registry

pub mod classify;
pub mod dedup;
pub mod filter;
pub mod job;
pub mod notify;
pub mod pipeline;
pub mod scheduler;

pub use classify::{Classification, ContentClassifier, LlmClassifier, RuleBasedClassifier};
pub use dedup::Deduplicator;
pub use job::{ActiveJob, JobCounts, JobLifecycle};
pub use notify::{HttpImpactAssessor, ImpactAssessor};
pub use pipeline::{CrawlReport, Monitor};
pub use scheduler::Scheduler;
