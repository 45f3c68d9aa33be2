//! libSQL storage layer for the regulatory update monitor.
//!
//! The [`Storage`] struct wraps a local libSQL database holding the source
//! registry, crawl job history, and canonical regulatory updates.
//!
//! Two invariants live here as SQL rather than application code:
//! - `UNIQUE(title, source_url)` on `regulatory_updates` — the dedup key is
//!   re-checked at write time via a conflict-ignoring insert, so concurrent
//!   crawls of the same source cannot double-insert.
//! - Job status updates are guarded with `WHERE status = ...` so the state
//!   machine only ever moves forward (a cancelled job stays cancelled).

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use url::Url;
use uuid::Uuid;

use regmonitor_shared::{
    CrawlerJob, JobStatus, JobType, MonitorError, RegulatorySource, RegulatoryUpdate, Result,
    SourceId,
};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path`, applying pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MonitorError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| MonitorError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| MonitorError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    MonitorError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Source registry
    // -----------------------------------------------------------------------

    /// Insert a new source record.
    pub async fn insert_source(&self, source: &RegulatorySource) -> Result<()> {
        let extraction_json = serde_json::to_string(&source.extraction)
            .map_err(|e| MonitorError::Storage(e.to_string()))?;
        self.conn
            .execute(
                "INSERT INTO sources (id, name, jurisdiction, source_type, base_url,
                                      extraction_json, update_frequency, is_active,
                                      last_crawled, next_crawl, reliability, priority, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    source.id.to_string(),
                    source.name.as_str(),
                    source.jurisdiction.as_str(),
                    source.source_type.as_str(),
                    source.base_url.as_str(),
                    extraction_json.as_str(),
                    source.update_frequency.map(|f| f.as_str()),
                    source.is_active as i64,
                    source.last_crawled.map(|t| t.to_rfc3339()),
                    source.next_crawl.map(|t| t.to_rfc3339()),
                    source.reliability,
                    source.priority,
                    source.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| MonitorError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Get a source by ID.
    pub async fn get_source(&self, id: &SourceId) -> Result<Option<RegulatorySource>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| MonitorError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_source(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(MonitorError::Storage(e.to_string())),
        }
    }

    /// List all sources, active first, by descending priority.
    pub async fn list_sources(&self) -> Result<Vec<RegulatorySource>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {SOURCE_COLUMNS} FROM sources
                     ORDER BY is_active DESC, priority DESC, name"
                ),
                params![],
            )
            .await
            .map_err(|e| MonitorError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_source(&row)?);
        }
        Ok(results)
    }

    /// Active sources whose `next_crawl` is null or in the past,
    /// ordered by descending priority.
    pub async fn sources_due_for_crawling(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<RegulatorySource>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {SOURCE_COLUMNS} FROM sources
                     WHERE is_active = 1 AND (next_crawl IS NULL OR next_crawl <= ?1)
                     ORDER BY priority DESC, name"
                ),
                params![now.to_rfc3339()],
            )
            .await
            .map_err(|e| MonitorError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_source(&row)?);
        }
        Ok(results)
    }

    /// Enable or disable a source.
    pub async fn set_source_active(&self, id: &SourceId, active: bool) -> Result<()> {
        self.conn
            .execute(
                "UPDATE sources SET is_active = ?1 WHERE id = ?2",
                params![active as i64, id.to_string()],
            )
            .await
            .map_err(|e| MonitorError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Apply the job-finalization feedback to a source in a single-row
    /// update keyed by source id: crawl timestamps and reliability.
    pub async fn finalize_source(
        &self,
        id: &SourceId,
        last_crawled: DateTime<Utc>,
        next_crawl: DateTime<Utc>,
        reliability: f64,
    ) -> Result<()> {
        self.conn
            .execute(
                "UPDATE sources SET last_crawled = ?1, next_crawl = ?2, reliability = ?3
                 WHERE id = ?4",
                params![
                    last_crawled.to_rfc3339(),
                    next_crawl.to_rfc3339(),
                    reliability,
                    id.to_string(),
                ],
            )
            .await
            .map_err(|e| MonitorError::Storage(e.to_string()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Crawl jobs
    // -----------------------------------------------------------------------

    /// Insert a new pending crawl job. Returns the generated job ID.
    pub async fn insert_job(&self, source_id: &SourceId, job_type: JobType) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO crawler_jobs (id, source_id, job_type, status, created_at)
                 VALUES (?1, ?2, ?3, 'pending', ?4)",
                params![
                    id.as_str(),
                    source_id.to_string(),
                    job_type.as_str(),
                    now.as_str()
                ],
            )
            .await
            .map_err(|e| MonitorError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// Transition a job from `pending` to `running`.
    /// Returns false if the job was not pending (e.g., already cancelled).
    pub async fn mark_job_running(
        &self,
        job_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE crawler_jobs SET status = 'running', started_at = ?1
                 WHERE id = ?2 AND status = 'pending'",
                params![started_at.to_rfc3339(), job_id],
            )
            .await
            .map_err(|e| MonitorError::Storage(e.to_string()))?;
        Ok(changed > 0)
    }

    /// Finalize a running job as `completed` or `failed` with counts and timing.
    /// Returns false if the job was not running (e.g., cancelled mid-flight).
    #[allow(clippy::too_many_arguments)]
    pub async fn finish_job(
        &self,
        job_id: &str,
        status: JobStatus,
        completed_at: DateTime<Utc>,
        execution_time_ms: i64,
        updates_found: u32,
        new_updates: u32,
        pages_scraped: u32,
        error_message: Option<&str>,
        sample_json: Option<&str>,
    ) -> Result<bool> {
        debug_assert!(matches!(status, JobStatus::Completed | JobStatus::Failed));
        let changed = self
            .conn
            .execute(
                "UPDATE crawler_jobs
                 SET status = ?1, completed_at = ?2, execution_time_ms = ?3,
                     updates_found = ?4, new_updates = ?5, pages_scraped = ?6,
                     error_message = ?7, sample_json = ?8
                 WHERE id = ?9 AND status = 'running'",
                params![
                    status.as_str(),
                    completed_at.to_rfc3339(),
                    execution_time_ms,
                    updates_found as i64,
                    new_updates as i64,
                    pages_scraped as i64,
                    error_message,
                    sample_json,
                    job_id,
                ],
            )
            .await
            .map_err(|e| MonitorError::Storage(e.to_string()))?;
        Ok(changed > 0)
    }

    /// Mark a pending or running job as `cancelled`.
    /// Returns false if the job had already reached a terminal state.
    pub async fn cancel_job(&self, job_id: &str) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn
            .execute(
                "UPDATE crawler_jobs SET status = 'cancelled', completed_at = ?1
                 WHERE id = ?2 AND status IN ('pending', 'running')",
                params![now.as_str(), job_id],
            )
            .await
            .map_err(|e| MonitorError::Storage(e.to_string()))?;
        Ok(changed > 0)
    }

    /// Current status of a job, if it exists.
    pub async fn job_status(&self, job_id: &str) -> Result<Option<JobStatus>> {
        let mut rows = self
            .conn
            .query(
                "SELECT status FROM crawler_jobs WHERE id = ?1",
                params![job_id],
            )
            .await
            .map_err(|e| MonitorError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let s: String = row
                    .get(0)
                    .map_err(|e| MonitorError::Storage(e.to_string()))?;
                Ok(Some(s.parse()?))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(MonitorError::Storage(e.to_string())),
        }
    }

    /// Get a full job record by ID.
    pub async fn get_job(&self, job_id: &str) -> Result<Option<CrawlerJob>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {JOB_COLUMNS} FROM crawler_jobs WHERE id = ?1"),
                params![job_id],
            )
            .await
            .map_err(|e| MonitorError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_job(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(MonitorError::Storage(e.to_string())),
        }
    }

    /// List jobs for a source, most recent first.
    pub async fn list_jobs_for_source(&self, source_id: &SourceId) -> Result<Vec<CrawlerJob>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {JOB_COLUMNS} FROM crawler_jobs
                     WHERE source_id = ?1 ORDER BY created_at DESC"
                ),
                params![source_id.to_string()],
            )
            .await
            .map_err(|e| MonitorError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_job(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Regulatory updates
    // -----------------------------------------------------------------------

    /// Existence check on the dedup key `(title, source_url)`.
    pub async fn update_exists(&self, title: &str, source_url: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM regulatory_updates WHERE title = ?1 AND source_url = ?2 LIMIT 1",
                params![title, source_url],
            )
            .await
            .map_err(|e| MonitorError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(_)) => Ok(true),
            Ok(None) => Ok(false),
            Err(e) => Err(MonitorError::Storage(e.to_string())),
        }
    }

    /// Insert an update, ignoring the write if the `(title, source_url)`
    /// key already exists. Returns whether a row was actually written —
    /// this is the race-safe dedup re-check at persistence time.
    pub async fn insert_update(&self, update: &RegulatoryUpdate) -> Result<bool> {
        let keywords_json = serde_json::to_string(&update.keywords)
            .map_err(|e| MonitorError::Storage(e.to_string()))?;
        let changed = self
            .conn
            .execute(
                "INSERT INTO regulatory_updates
                     (id, source_id, regulation_ref, title, description, content,
                      update_type, published_date, effective_date, source_url,
                      document_url, status, impact, keywords_json, confidence, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                 ON CONFLICT(title, source_url) DO NOTHING",
                params![
                    update.id.as_str(),
                    update.source_id.to_string(),
                    update.regulation_ref.as_deref(),
                    update.title.as_str(),
                    update.description.as_str(),
                    update.content.as_deref(),
                    update.update_type.as_str(),
                    update.published_date.map(|t| t.to_rfc3339()),
                    update.effective_date.map(|t| t.to_rfc3339()),
                    update.source_url.as_str(),
                    update.document_url.as_deref(),
                    update.status.as_str(),
                    update.impact.as_str(),
                    keywords_json.as_str(),
                    update.confidence,
                    update.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| MonitorError::Storage(e.to_string()))?;
        Ok(changed > 0)
    }

    /// List updates for a source, most recent first.
    pub async fn list_updates_for_source(
        &self,
        source_id: &SourceId,
    ) -> Result<Vec<RegulatoryUpdate>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {UPDATE_COLUMNS} FROM regulatory_updates
                     WHERE source_id = ?1 ORDER BY created_at DESC"
                ),
                params![source_id.to_string()],
            )
            .await
            .map_err(|e| MonitorError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_update(&row)?);
        }
        Ok(results)
    }

    /// Get an update by ID.
    pub async fn get_update(&self, update_id: &str) -> Result<Option<RegulatoryUpdate>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {UPDATE_COLUMNS} FROM regulatory_updates WHERE id = ?1"),
                params![update_id],
            )
            .await
            .map_err(|e| MonitorError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_update(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(MonitorError::Storage(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

const SOURCE_COLUMNS: &str = "id, name, jurisdiction, source_type, base_url, extraction_json, \
     update_frequency, is_active, last_crawled, next_crawl, reliability, priority, created_at";

const JOB_COLUMNS: &str = "id, source_id, job_type, status, started_at, completed_at, \
     updates_found, new_updates, pages_scraped, execution_time_ms, error_message, sample_json";

const UPDATE_COLUMNS: &str = "id, source_id, regulation_ref, title, description, content, \
     update_type, published_date, effective_date, source_url, document_url, status, impact, \
     keywords_json, confidence, created_at";

fn get_string(row: &libsql::Row, idx: i32) -> Result<String> {
    row.get::<String>(idx)
        .map_err(|e| MonitorError::Storage(e.to_string()))
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MonitorError::Storage(format!("invalid timestamp: {e}")))
}

fn get_opt_ts(row: &libsql::Row, idx: i32) -> Result<Option<DateTime<Utc>>> {
    match row.get::<String>(idx) {
        Ok(s) => Ok(Some(parse_ts(&s)?)),
        Err(_) => Ok(None),
    }
}

fn row_to_source(row: &libsql::Row) -> Result<RegulatorySource> {
    let base_url: Url = get_string(row, 4)?
        .parse()
        .map_err(|e| MonitorError::Storage(format!("invalid base_url: {e}")))?;
    let extraction = serde_json::from_str(&get_string(row, 5)?)
        .map_err(|e| MonitorError::Storage(format!("invalid extraction_json: {e}")))?;

    Ok(RegulatorySource {
        id: get_string(row, 0)?
            .parse()
            .map_err(|e| MonitorError::Storage(format!("invalid source id: {e}")))?,
        name: get_string(row, 1)?,
        jurisdiction: get_string(row, 2)?,
        source_type: get_string(row, 3)?.parse()?,
        base_url,
        extraction,
        update_frequency: match row.get::<String>(6) {
            Ok(s) => Some(s.parse()?),
            Err(_) => None,
        },
        is_active: row.get::<i64>(7).unwrap_or(0) != 0,
        last_crawled: get_opt_ts(row, 8)?,
        next_crawl: get_opt_ts(row, 9)?,
        reliability: row
            .get::<f64>(10)
            .map_err(|e| MonitorError::Storage(e.to_string()))?,
        priority: row
            .get::<i64>(11)
            .map_err(|e| MonitorError::Storage(e.to_string()))?,
        created_at: parse_ts(&get_string(row, 12)?)?,
    })
}

fn row_to_job(row: &libsql::Row) -> Result<CrawlerJob> {
    Ok(CrawlerJob {
        id: get_string(row, 0)?,
        source_id: get_string(row, 1)?
            .parse()
            .map_err(|e| MonitorError::Storage(format!("invalid source id: {e}")))?,
        job_type: get_string(row, 2)?.parse()?,
        status: get_string(row, 3)?.parse()?,
        started_at: get_opt_ts(row, 4)?,
        completed_at: get_opt_ts(row, 5)?,
        updates_found: row.get::<i64>(6).unwrap_or(0) as u32,
        new_updates: row.get::<i64>(7).unwrap_or(0) as u32,
        pages_scraped: row.get::<i64>(8).unwrap_or(0) as u32,
        execution_time_ms: row.get::<i64>(9).ok(),
        error_message: row.get::<String>(10).ok(),
        sample_json: row.get::<String>(11).ok(),
    })
}

fn row_to_update(row: &libsql::Row) -> Result<RegulatoryUpdate> {
    let keywords: Vec<String> = serde_json::from_str(&get_string(row, 13)?)
        .map_err(|e| MonitorError::Storage(format!("invalid keywords_json: {e}")))?;

    Ok(RegulatoryUpdate {
        id: get_string(row, 0)?,
        source_id: get_string(row, 1)?
            .parse()
            .map_err(|e| MonitorError::Storage(format!("invalid source id: {e}")))?,
        regulation_ref: row.get::<String>(2).ok(),
        title: get_string(row, 3)?,
        description: get_string(row, 4)?,
        content: row.get::<String>(5).ok(),
        update_type: get_string(row, 6)?.parse()?,
        published_date: get_opt_ts(row, 7)?,
        effective_date: get_opt_ts(row, 8)?,
        source_url: get_string(row, 9)?,
        document_url: row.get::<String>(10).ok(),
        status: get_string(row, 11)?.parse()?,
        impact: get_string(row, 12)?.parse()?,
        keywords,
        confidence: row
            .get::<f64>(14)
            .map_err(|e| MonitorError::Storage(e.to_string()))?,
        created_at: parse_ts(&get_string(row, 15)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use regmonitor_shared::{ImpactLevel, SourceType, UpdateStatus, UpdateType};

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("rm_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn test_source(name: &str) -> RegulatorySource {
        RegulatorySource::new(
            name,
            "UK",
            SourceType::Regulator,
            Url::parse(&format!("https://{}.example.org/news", name.to_lowercase())).unwrap(),
        )
    }

    fn test_update(source_id: &SourceId, title: &str, source_url: &str) -> RegulatoryUpdate {
        RegulatoryUpdate {
            id: Uuid::now_v7().to_string(),
            source_id: source_id.clone(),
            regulation_ref: None,
            title: title.into(),
            description: "A new enforcement notice".into(),
            content: None,
            update_type: UpdateType::Guidance,
            published_date: None,
            effective_date: None,
            source_url: source_url.into(),
            document_url: None,
            status: UpdateStatus::Pending,
            impact: ImpactLevel::Medium,
            keywords: vec!["enforcement".into()],
            confidence: 0.7,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("rm_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn source_crud_roundtrip() {
        let storage = test_storage().await;
        let mut source = test_source("ICO");
        source.extraction.items_path = Some("data.items".into());
        source.priority = 5;

        storage.insert_source(&source).await.expect("insert source");

        let found = storage
            .get_source(&source.id)
            .await
            .expect("get source")
            .expect("source exists");
        assert_eq!(found.name, "ICO");
        assert_eq!(found.source_type, SourceType::Regulator);
        assert_eq!(found.extraction.items_path.as_deref(), Some("data.items"));
        assert_eq!(found.reliability, 1.0);
        assert_eq!(found.priority, 5);
        assert!(found.next_crawl.is_none());

        storage
            .set_source_active(&source.id, false)
            .await
            .expect("deactivate");
        let found = storage.get_source(&source.id).await.unwrap().unwrap();
        assert!(!found.is_active);
    }

    #[tokio::test]
    async fn due_sources_filtered_and_ordered_by_priority() {
        let storage = test_storage().await;
        let now = Utc::now();

        let mut low = test_source("Low");
        low.priority = 1;
        let mut high = test_source("High");
        high.priority = 10;
        let mut future = test_source("Future");
        future.next_crawl = Some(now + chrono::Duration::hours(12));
        let mut inactive = test_source("Inactive");
        inactive.is_active = false;
        let mut overdue = test_source("Overdue");
        overdue.priority = 5;
        overdue.next_crawl = Some(now - chrono::Duration::hours(1));

        for s in [&low, &high, &future, &inactive, &overdue] {
            storage.insert_source(s).await.unwrap();
        }

        let due = storage.sources_due_for_crawling(now).await.expect("query");
        let names: Vec<&str> = due.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["High", "Overdue", "Low"]);
    }

    #[tokio::test]
    async fn finalize_source_updates_schedule_and_reliability() {
        let storage = test_storage().await;
        let source = test_source("FCA");
        storage.insert_source(&source).await.unwrap();

        let now = Utc::now();
        let next = now + chrono::Duration::hours(24);
        storage
            .finalize_source(&source.id, now, next, 0.8)
            .await
            .expect("finalize");

        let found = storage.get_source(&source.id).await.unwrap().unwrap();
        assert_eq!(found.reliability, 0.8);
        assert!(found.last_crawled.is_some());
        assert!(found.next_crawl.unwrap() > now);
    }

    #[tokio::test]
    async fn job_lifecycle_with_transition_guards() {
        let storage = test_storage().await;
        let source = test_source("EDPB");
        storage.insert_source(&source).await.unwrap();

        let job_id = storage
            .insert_job(&source.id, JobType::Scheduled)
            .await
            .expect("insert job");
        assert_eq!(
            storage.job_status(&job_id).await.unwrap(),
            Some(JobStatus::Pending)
        );

        let started = Utc::now();
        assert!(storage.mark_job_running(&job_id, started).await.unwrap());
        // Second transition attempt must fail the guard.
        assert!(!storage.mark_job_running(&job_id, started).await.unwrap());

        let done = storage
            .finish_job(
                &job_id,
                JobStatus::Completed,
                Utc::now(),
                1234,
                10,
                3,
                2,
                None,
                Some(r#"[{"title":"x"}]"#),
            )
            .await
            .expect("finish");
        assert!(done);

        let job = storage.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.updates_found, 10);
        assert_eq!(job.new_updates, 3);
        assert_eq!(job.pages_scraped, 2);
        assert_eq!(job.execution_time_ms, Some(1234));
        assert!(job.completed_at.is_some());

        // Terminal jobs cannot be cancelled or re-finished.
        assert!(!storage.cancel_job(&job_id).await.unwrap());
        assert!(
            !storage
                .finish_job(
                    &job_id,
                    JobStatus::Failed,
                    Utc::now(),
                    1,
                    0,
                    0,
                    0,
                    Some("late"),
                    None
                )
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn cancelled_job_cannot_be_completed() {
        let storage = test_storage().await;
        let source = test_source("BfDI");
        storage.insert_source(&source).await.unwrap();

        let job_id = storage.insert_job(&source.id, JobType::Manual).await.unwrap();
        assert!(storage.mark_job_running(&job_id, Utc::now()).await.unwrap());
        assert!(storage.cancel_job(&job_id).await.unwrap());

        let done = storage
            .finish_job(
                &job_id,
                JobStatus::Completed,
                Utc::now(),
                10,
                0,
                0,
                0,
                None,
                None,
            )
            .await
            .unwrap();
        assert!(!done);
        assert_eq!(
            storage.job_status(&job_id).await.unwrap(),
            Some(JobStatus::Cancelled)
        );
    }

    #[tokio::test]
    async fn update_dedup_key_is_enforced() {
        let storage = test_storage().await;
        let source = test_source("CNIL");
        storage.insert_source(&source).await.unwrap();

        let first = test_update(&source.id, "New Guidance on Cookies", "https://x/1");
        assert!(storage.insert_update(&first).await.expect("first insert"));
        assert!(
            storage
                .update_exists("New Guidance on Cookies", "https://x/1")
                .await
                .unwrap()
        );

        // Same (title, source_url): silently ignored.
        let dup = test_update(&source.id, "New Guidance on Cookies", "https://x/1");
        assert!(!storage.insert_update(&dup).await.expect("dup insert"));

        // Same title, different URL: a distinct update.
        let other = test_update(&source.id, "New Guidance on Cookies", "https://x/2");
        assert!(storage.insert_update(&other).await.expect("other insert"));

        let updates = storage.list_updates_for_source(&source.id).await.unwrap();
        assert_eq!(updates.len(), 2);
    }

    #[tokio::test]
    async fn update_roundtrip_preserves_fields() {
        let storage = test_storage().await;
        let source = test_source("ICO2");
        storage.insert_source(&source).await.unwrap();

        let mut update = test_update(&source.id, "Draft AI Code", "https://x/ai");
        update.update_type = UpdateType::Consultation;
        update.keywords = vec!["consultation".into(), "artificial".into()];
        update.confidence = 0.9;
        storage.insert_update(&update).await.unwrap();

        let found = storage
            .get_update(&update.id)
            .await
            .unwrap()
            .expect("update exists");
        assert_eq!(found.update_type, UpdateType::Consultation);
        assert_eq!(found.keywords.len(), 2);
        assert_eq!(found.confidence, 0.9);
        assert_eq!(found.status, UpdateStatus::Pending);
    }
}
