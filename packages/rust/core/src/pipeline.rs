//! The crawl pipeline: extraction, filtering, classification, dedup,
//! persistence, and notification fan-out for one source.
//!
//! [`Monitor`] wires the collaborators together behind trait objects so
//! tests can substitute the network-facing pieces. A crawl always leaves a
//! terminal job row behind, whatever happens mid-flight.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use regmonitor_crawler::{PageFetcher, StrategyRegistry};
use regmonitor_shared::{
    AppConfig, ExtractedUpdate, ImpactLevel, JobStatus, JobType, RegulatorySource,
    RegulatoryUpdate, Result, UpdateStatus,
};
use regmonitor_storage::Storage;

use crate::classify::{Classification, ContentClassifier, RuleBasedClassifier};
use crate::dedup::Deduplicator;
use crate::filter;
use crate::job::{ActiveJob, JobCounts, JobLifecycle};
use crate::notify::{ImpactAssessor, fan_out};

/// How many raw candidates are kept in the job's audit sample.
const SAMPLE_SIZE: usize = 3;

/// Outcome of one crawl attempt.
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub job_id: String,
    pub status: JobStatus,
    pub updates_found: u32,
    pub new_updates: u32,
    pub pages_scraped: u32,
}

/// The assembled monitoring pipeline.
pub struct Monitor {
    storage: Arc<Storage>,
    fetcher: Arc<dyn PageFetcher>,
    classifier: Arc<dyn ContentClassifier>,
    /// Absent assessor disables fan-out (local dry runs).
    assessor: Option<Arc<dyn ImpactAssessor>>,
    registry: StrategyRegistry,
    lifecycle: JobLifecycle,
    /// Fetch timeout applied to sources without their own override.
    fetch_timeout_secs: u64,
}

impl Monitor {
    pub fn new(
        storage: Arc<Storage>,
        fetcher: Arc<dyn PageFetcher>,
        classifier: Arc<dyn ContentClassifier>,
        assessor: Option<Arc<dyn ImpactAssessor>>,
        config: &AppConfig,
    ) -> Self {
        let lifecycle = JobLifecycle::new(storage.clone(), config.defaults.crawl_interval_hours);
        Self {
            storage,
            fetcher,
            classifier,
            assessor,
            registry: StrategyRegistry::new(),
            lifecycle,
            fetch_timeout_secs: config.defaults.fetch_timeout_secs,
        }
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// Crawl one source end to end.
    ///
    /// Any mid-flight failure (extraction, storage) finalizes the job as
    /// failed with the reliability penalty and still returns a report.
    /// Returns [`regmonitor_shared::MonitorError::Cancelled`] only when the
    /// job was cancelled before it could start running.
    #[instrument(skip_all, fields(source = %source.name, source_type = %source.source_type))]
    pub async fn crawl_source(
        &self,
        source: &RegulatorySource,
        job_type: JobType,
    ) -> Result<CrawlReport> {
        // Sources without their own timeout inherit the configured default.
        let source = {
            let mut s = source.clone();
            s.extraction.timeout_secs.get_or_insert(self.fetch_timeout_secs);
            s
        };
        let source = &source;

        let job = self.lifecycle.begin(source, job_type).await?;

        match self.run_job(source, &job).await {
            Ok(report) => Ok(report),
            Err(e) => {
                let status = self.lifecycle.fail(source, &job, &e.to_string()).await?;
                Ok(CrawlReport {
                    job_id: job.id,
                    status,
                    updates_found: 0,
                    new_updates: 0,
                    pages_scraped: 0,
                })
            }
        }
    }

    /// The running phase of a crawl. Errors here are turned into a failed
    /// job by the caller, so the job row always reaches a terminal state.
    async fn run_job(&self, source: &RegulatorySource, job: &ActiveJob) -> Result<CrawlReport> {
        let strategy = self.registry.select(source);
        debug!(strategy = strategy.name(), "strategy selected");

        let outcome = strategy.extract(source, self.fetcher.as_ref()).await?;
        let updates_found = outcome.candidates.len() as u32;
        let sample_json = audit_sample(&outcome.candidates);

        // Cancellation lands between stages; terminal-state guards in
        // storage catch anything later.
        if self.lifecycle.is_cancelled(&job.id).await? {
            return self
                .finish(
                    source,
                    job,
                    JobCounts {
                        updates_found,
                        new_updates: 0,
                        pages_scraped: outcome.pages_scraped,
                    },
                    sample_json.as_deref(),
                    Vec::new(),
                )
                .await;
        }

        let mut persisted = Vec::new();
        let dedup = Deduplicator::new(&self.storage);
        for candidate in &outcome.candidates {
            if !filter::is_relevant(candidate) {
                continue;
            }
            // A storage error on one candidate skips that candidate only;
            // the rest of the batch still runs.
            match dedup.is_duplicate(candidate).await {
                Ok(true) => {
                    debug!(title = %candidate.title, "duplicate candidate skipped");
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(title = %candidate.title, error = %e, "duplicate check failed, candidate skipped");
                    continue;
                }
            }

            let classification = self.classify(candidate).await?;
            let update = build_update(source, candidate, classification);
            // Lost races against a concurrent crawl surface here as a
            // no-op insert.
            match self.storage.insert_update(&update).await {
                Ok(true) => persisted.push(update),
                Ok(false) => {}
                Err(e) => {
                    warn!(title = %update.title, error = %e, "update insert failed, candidate skipped");
                }
            }
        }

        self.finish(
            source,
            job,
            JobCounts {
                updates_found,
                new_updates: persisted.len() as u32,
                pages_scraped: outcome.pages_scraped,
            },
            sample_json.as_deref(),
            persisted,
        )
        .await
    }

    /// Classify with the configured classifier, falling back to rules on
    /// any failure.
    async fn classify(&self, candidate: &ExtractedUpdate) -> Result<Classification> {
        match self.classifier.classify(candidate).await {
            Ok(classification) => Ok(classification),
            Err(e) => {
                warn!(title = %candidate.title, error = %e, "classifier failed, using rules");
                RuleBasedClassifier.classify(candidate).await
            }
        }
    }

    async fn finish(
        &self,
        source: &RegulatorySource,
        job: &ActiveJob,
        counts: JobCounts,
        sample_json: Option<&str>,
        persisted: Vec<RegulatoryUpdate>,
    ) -> Result<CrawlReport> {
        let status = self
            .lifecycle
            .complete(source, job, counts, sample_json)
            .await?;

        if status == JobStatus::Completed && !persisted.is_empty() {
            if let Some(assessor) = &self.assessor {
                let delivered = fan_out(assessor.as_ref(), &persisted).await;
                info!(delivered, total = persisted.len(), "impact fan-out done");
            }
        }

        Ok(CrawlReport {
            job_id: job.id.clone(),
            status,
            updates_found: counts.updates_found,
            new_updates: counts.new_updates,
            pages_scraped: counts.pages_scraped,
        })
    }

    /// Request cancellation of a job by id.
    pub async fn cancel_job(&self, job_id: &str) -> Result<bool> {
        self.lifecycle.cancel(job_id).await
    }
}

/// JSON sample of the first few raw candidates, kept on the job for audit.
fn audit_sample(candidates: &[ExtractedUpdate]) -> Option<String> {
    if candidates.is_empty() {
        return None;
    }
    let head = &candidates[..candidates.len().min(SAMPLE_SIZE)];
    serde_json::to_string(head).ok()
}

/// Assemble the canonical update record for a classified candidate.
fn build_update(
    source: &RegulatorySource,
    candidate: &ExtractedUpdate,
    classification: Classification,
) -> RegulatoryUpdate {
    RegulatoryUpdate {
        id: Uuid::now_v7().to_string(),
        source_id: source.id.clone(),
        regulation_ref: None,
        title: candidate.title.clone(),
        description: candidate.description.clone(),
        content: None,
        update_type: classification.update_type,
        published_date: candidate.date,
        effective_date: None,
        source_url: candidate.link.clone(),
        document_url: None,
        status: UpdateStatus::Pending,
        // Impact stays at the floor until the assessment service reports back.
        impact: ImpactLevel::Low,
        keywords: classification.keywords,
        confidence: classification.confidence,
        created_at: Utc::now(),
    }
}
