//! Crawl job lifecycle and source reliability feedback.
//!
//! Every crawl attempt is tracked as a job moving through
//! pending → running → {completed | failed | cancelled}. Finalizing a job
//! also finalizes its source: `last_crawled` and `next_crawl` always
//! advance, and `reliability` moves up on success, down on failure, and
//! stays put on cancellation. The storage layer guards the transitions,
//! so a job cancelled mid-run can never be flipped back to completed.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use regmonitor_shared::{
    JobStatus, JobType, MonitorError, RegulatorySource, Result, UpdateFrequency,
};
use regmonitor_storage::Storage;

/// Reliability gain applied on a completed crawl.
const RELIABILITY_GAIN: f64 = 0.1;
/// Reliability penalty applied on a failed crawl.
const RELIABILITY_PENALTY: f64 = 0.2;
/// Reliability bounds: sources never become fully untrusted.
const RELIABILITY_MAX: f64 = 1.0;
const RELIABILITY_MIN: f64 = 0.1;

/// A job that has entered the running state.
#[derive(Debug, Clone)]
pub struct ActiveJob {
    pub id: String,
    pub started_at: DateTime<Utc>,
}

/// Counters reported when a job completes.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobCounts {
    /// Raw candidates extracted before filtering.
    pub updates_found: u32,
    /// Candidates persisted as new updates.
    pub new_updates: u32,
    pub pages_scraped: u32,
}

/// Drives jobs through their state machine and applies source feedback.
pub struct JobLifecycle {
    storage: Arc<Storage>,
    /// Fallback crawl interval for sources without an `update_frequency`.
    default_interval_hours: i64,
}

impl JobLifecycle {
    pub fn new(storage: Arc<Storage>, default_interval_hours: i64) -> Self {
        Self {
            storage,
            default_interval_hours,
        }
    }

    /// Create a pending job and move it to running.
    ///
    /// Returns [`MonitorError::Cancelled`] if the job was cancelled while
    /// still pending; the source's crawl timestamps are advanced so a
    /// cancelled source does not immediately come due again.
    pub async fn begin(&self, source: &RegulatorySource, job_type: JobType) -> Result<ActiveJob> {
        let job_id = self.storage.insert_job(&source.id, job_type).await?;
        let started_at = Utc::now();

        if !self.storage.mark_job_running(&job_id, started_at).await? {
            self.advance_source(source, source.reliability).await?;
            return Err(MonitorError::Cancelled);
        }

        info!(job_id = %job_id, source = %source.name, %job_type, "crawl job started");
        Ok(ActiveJob {
            id: job_id,
            started_at,
        })
    }

    /// Whether the job has been cancelled out from under the pipeline.
    pub async fn is_cancelled(&self, job_id: &str) -> Result<bool> {
        Ok(self.storage.job_status(job_id).await? == Some(JobStatus::Cancelled))
    }

    /// Finish a job as completed and reward the source.
    ///
    /// If the job was cancelled mid-run the completion is a no-op on the
    /// job row; the source's timestamps still advance, reliability unchanged.
    pub async fn complete(
        &self,
        source: &RegulatorySource,
        job: &ActiveJob,
        counts: JobCounts,
        sample_json: Option<&str>,
    ) -> Result<JobStatus> {
        let completed_at = Utc::now();
        let elapsed_ms = (completed_at - job.started_at).num_milliseconds();

        let finished = self
            .storage
            .finish_job(
                &job.id,
                JobStatus::Completed,
                completed_at,
                elapsed_ms,
                counts.updates_found,
                counts.new_updates,
                counts.pages_scraped,
                None,
                sample_json,
            )
            .await?;

        if !finished {
            warn!(job_id = %job.id, "job cancelled before completion could land");
            self.advance_source(source, source.reliability).await?;
            return Ok(JobStatus::Cancelled);
        }

        info!(
            job_id = %job.id,
            source = %source.name,
            updates_found = counts.updates_found,
            new_updates = counts.new_updates,
            elapsed_ms,
            "crawl job completed"
        );
        self.advance_source(source, next_reliability(source.reliability, true))
            .await?;
        Ok(JobStatus::Completed)
    }

    /// Finish a job as failed and penalize the source.
    pub async fn fail(
        &self,
        source: &RegulatorySource,
        job: &ActiveJob,
        error: &str,
    ) -> Result<JobStatus> {
        let completed_at = Utc::now();
        let elapsed_ms = (completed_at - job.started_at).num_milliseconds();

        let finished = self
            .storage
            .finish_job(
                &job.id,
                JobStatus::Failed,
                completed_at,
                elapsed_ms,
                0,
                0,
                0,
                Some(error),
                None,
            )
            .await?;

        if !finished {
            self.advance_source(source, source.reliability).await?;
            return Ok(JobStatus::Cancelled);
        }

        warn!(job_id = %job.id, source = %source.name, error, "crawl job failed");
        self.advance_source(source, next_reliability(source.reliability, false))
            .await?;
        Ok(JobStatus::Failed)
    }

    /// Request cancellation of a pending or running job.
    pub async fn cancel(&self, job_id: &str) -> Result<bool> {
        self.storage.cancel_job(job_id).await
    }

    /// Advance the source's crawl timestamps and write the new reliability.
    async fn advance_source(&self, source: &RegulatorySource, reliability: f64) -> Result<()> {
        let now = Utc::now();
        let next = now + crawl_interval(source, self.default_interval_hours);
        self.storage
            .finalize_source(&source.id, now, next, reliability)
            .await
    }
}

/// Reliability feedback: small gain on success, larger penalty on failure,
/// clamped to [0.1, 1.0].
pub fn next_reliability(current: f64, success: bool) -> f64 {
    if success {
        (current + RELIABILITY_GAIN).min(RELIABILITY_MAX)
    } else {
        (current - RELIABILITY_PENALTY).max(RELIABILITY_MIN)
    }
}

/// Crawl interval for a source: its declared publishing cadence, or the
/// configured default.
pub fn crawl_interval(source: &RegulatorySource, default_hours: i64) -> Duration {
    match source.update_frequency {
        Some(UpdateFrequency::Hourly) => Duration::hours(1),
        Some(UpdateFrequency::Daily) => Duration::hours(24),
        Some(UpdateFrequency::Weekly) => Duration::hours(168),
        None => Duration::hours(default_hours),
    }
}
