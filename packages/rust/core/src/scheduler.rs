//! Crawl scheduling: finds due sources and runs them with bounded
//! concurrency.
//!
//! A source is due when it is active and its `next_crawl` is unset or in
//! the past; the storage query orders by priority. Per-source failures are
//! isolated, so one broken source never blocks the rest of a run.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use regmonitor_shared::{JobType, MonitorError, Result, SourceId};

use crate::pipeline::{CrawlReport, Monitor};

/// Runs crawls for due sources, at most `workers` at a time.
pub struct Scheduler {
    monitor: Arc<Monitor>,
    workers: usize,
}

impl Scheduler {
    pub fn new(monitor: Arc<Monitor>, workers: usize) -> Self {
        Self {
            monitor,
            workers: workers.max(1),
        }
    }

    /// Crawl every source due at `now`. Returns a report per source that
    /// reached a terminal job state; cancelled-before-start and panicked
    /// crawls are logged and skipped.
    #[instrument(skip_all, fields(workers = self.workers))]
    pub async fn run_due_sources(&self, now: DateTime<Utc>) -> Result<Vec<CrawlReport>> {
        let due = self.monitor.storage().sources_due_for_crawling(now).await?;
        if due.is_empty() {
            info!("no sources due for crawling");
            return Ok(Vec::new());
        }
        info!(due = due.len(), "starting scheduled crawl run");

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(due.len());
        for source in due {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let monitor = self.monitor.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let name = source.name.clone();
                (name, monitor.crawl_source(&source, JobType::Scheduled).await)
            }));
        }

        let mut reports = Vec::new();
        for handle in handles {
            match handle.await {
                Ok((_, Ok(report))) => reports.push(report),
                Ok((name, Err(MonitorError::Cancelled))) => {
                    info!(source = %name, "crawl cancelled before start");
                }
                Ok((name, Err(e))) => {
                    warn!(source = %name, error = %e, "crawl errored");
                }
                Err(e) => {
                    warn!(error = %e, "crawl task panicked");
                }
            }
        }

        info!(completed = reports.len(), "scheduled crawl run finished");
        Ok(reports)
    }

    /// Crawl one source by id, regardless of its schedule.
    pub async fn run_source(&self, id: &SourceId, job_type: JobType) -> Result<CrawlReport> {
        let source = self
            .monitor
            .storage()
            .get_source(id)
            .await?
            .ok_or_else(|| MonitorError::validation(format!("unknown source {id}")))?;

        if !source.is_active {
            return Err(MonitorError::validation(format!(
                "source '{}' is disabled",
                source.name
            )));
        }

        self.monitor.crawl_source(&source, job_type).await
    }
}
