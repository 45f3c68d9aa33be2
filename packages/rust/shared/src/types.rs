//! Core domain types for the regulatory update monitor.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::MonitorError;

// ---------------------------------------------------------------------------
// SourceId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for regulatory-source identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub Uuid);

impl SourceId {
    /// Generate a new time-sortable source identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SourceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Stable string form used in storage and logs.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = MonitorError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant),)+
                    other => Err(MonitorError::validation(format!(
                        concat!("unknown ", stringify!($name), " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

str_enum! {
    /// Kind of external authority a source represents; drives strategy dispatch.
    SourceType {
        Government => "government",
        Regulator => "regulator",
        LegalPublisher => "legal_publisher",
        Api => "api",
    }
}

str_enum! {
    /// How a crawl attempt was triggered.
    JobType {
        Scheduled => "scheduled",
        Manual => "manual",
        Retry => "retry",
    }
}

str_enum! {
    /// Crawl job state machine: pending → running → {completed|failed|cancelled}.
    JobStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

str_enum! {
    /// Classified kind of a regulatory update.
    UpdateType {
        NewRegulation => "new_regulation",
        Amendment => "amendment",
        Guidance => "guidance",
        Consultation => "consultation",
        Pending => "pending",
    }
}

str_enum! {
    /// Human-review state of a persisted update.
    UpdateStatus {
        Pending => "pending",
        Reviewed => "reviewed",
        Implemented => "implemented",
        Ignored => "ignored",
    }
}

str_enum! {
    /// Severity assigned by the downstream impact pipeline.
    ImpactLevel {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

str_enum! {
    /// How often a source publishes; refines the next-crawl interval.
    UpdateFrequency {
        Hourly => "hourly",
        Daily => "daily",
        Weekly => "weekly",
    }
}

impl JobStatus {
    /// Terminal states are never left once entered.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Forward-only transition check for the job state machine.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Running | Self::Cancelled),
            Self::Running => next.is_terminal(),
            _ => false,
        }
    }
}

impl UpdateType {
    /// Draft/consultation-stage updates warrant speculative impact analysis.
    pub fn is_forward_looking(&self) -> bool {
        matches!(self, Self::Pending | Self::Consultation)
    }
}

// ---------------------------------------------------------------------------
// RegulatorySource
// ---------------------------------------------------------------------------

/// Per-source extraction configuration: selector overrides and crawl limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// CSS selector for list items containing one update each.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_selector: Option<String>,
    /// CSS selector for the title element within an item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_selector: Option<String>,
    /// CSS selector for the description element within an item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_selector: Option<String>,
    /// CSS selector for the date element within an item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_selector: Option<String>,
    /// Dot-separated path to the item array in a JSON API response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_path: Option<String>,
    /// Maximum pages to follow for paginated APIs.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Delay between successive page fetches of one source, in ms.
    #[serde(default)]
    pub delay_ms: u64,
    /// Per-fetch timeout in seconds. Unset sources inherit the
    /// application-wide `fetch_timeout_secs` default at crawl time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_max_pages() -> u32 {
    5
}

/// Last-resort per-fetch timeout when neither the source nor the app
/// config provides one.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

impl ExtractionConfig {
    /// Per-fetch timeout for this source.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS))
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            item_selector: None,
            title_selector: None,
            description_selector: None,
            date_selector: None,
            items_path: None,
            max_pages: default_max_pages(),
            delay_ms: 0,
            timeout_secs: None,
        }
    }
}

/// A monitored regulatory-authority source.
///
/// Timestamps and `reliability` are mutated only by the job lifecycle
/// manager at job finalization; everything else is administrative
/// configuration. The crawler never deletes sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegulatorySource {
    pub id: SourceId,
    /// Human-readable name (e.g., "ICO News").
    pub name: String,
    /// Jurisdiction code (e.g., "UK", "EU").
    pub jurisdiction: String,
    pub source_type: SourceType,
    /// Entry URL for the source.
    pub base_url: Url,
    /// Extraction selectors and crawl limits.
    #[serde(default)]
    pub extraction: ExtractionConfig,
    /// Publishing cadence, if known. Refines the next-crawl interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_frequency: Option<UpdateFrequency>,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_crawled: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_crawl: Option<DateTime<Utc>>,
    /// Reputation signal in [0.1, 1.0]; starts at 1.0.
    pub reliability: f64,
    /// Higher-priority sources are crawled first.
    pub priority: i64,
    pub created_at: DateTime<Utc>,
}

impl RegulatorySource {
    /// Create a new active source with default crawl parameters.
    pub fn new(
        name: impl Into<String>,
        jurisdiction: impl Into<String>,
        source_type: SourceType,
        base_url: Url,
    ) -> Self {
        Self {
            id: SourceId::new(),
            name: name.into(),
            jurisdiction: jurisdiction.into(),
            source_type,
            base_url,
            extraction: ExtractionConfig::default(),
            update_frequency: None,
            is_active: true,
            last_crawled: None,
            next_crawl: None,
            reliability: 1.0,
            priority: 0,
            created_at: Utc::now(),
        }
    }

    /// Host of the base URL, used for strategy dispatch.
    pub fn domain(&self) -> &str {
        self.base_url.host_str().unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// CrawlerJob
// ---------------------------------------------------------------------------

/// One record per crawl attempt. Append-only after a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerJob {
    pub id: String,
    pub source_id: SourceId,
    pub job_type: JobType,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Set iff status is terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Raw candidates extracted before filtering.
    pub updates_found: u32,
    /// Candidates that survived filtering and dedup and were persisted.
    pub new_updates: u32,
    pub pages_scraped: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Sample of extracted data (JSON) kept for audit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_json: Option<String>,
}

// ---------------------------------------------------------------------------
// RegulatoryUpdate
// ---------------------------------------------------------------------------

/// A candidate that survived relevance filtering and deduplication.
///
/// Uniqueness invariant: no two persisted updates share the same
/// `(title, source_url)` pair — this is the dedup key, enforced as a
/// database constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegulatoryUpdate {
    pub id: String,
    pub source_id: SourceId,
    /// Optional reference to a known regulation (e.g., "GDPR Art. 30").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regulation_ref: Option<String>,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub update_type: UpdateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<DateTime<Utc>>,
    /// URL of the page/item the update was extracted from (dedup key part).
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_url: Option<String>,
    pub status: UpdateStatus,
    pub impact: ImpactLevel,
    pub keywords: Vec<String>,
    /// Relevance confidence in [0.0, 1.0].
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ExtractedUpdate (transient)
// ---------------------------------------------------------------------------

/// In-memory candidate produced by an extraction strategy, before the
/// relevance filter, dedup, and persistence. Never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedUpdate {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Absolute URL of the item.
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}
