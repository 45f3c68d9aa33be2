//! SQL migration definitions for the regmonitor database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: sources, crawler_jobs, regulatory_updates",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Monitored regulatory-authority sources
CREATE TABLE IF NOT EXISTS sources (
    id               TEXT PRIMARY KEY,
    name             TEXT NOT NULL,
    jurisdiction     TEXT NOT NULL,
    source_type      TEXT NOT NULL,
    base_url         TEXT NOT NULL,
    extraction_json  TEXT NOT NULL,
    update_frequency TEXT,
    is_active        INTEGER NOT NULL DEFAULT 1,
    last_crawled     TEXT,
    next_crawl       TEXT,
    reliability      REAL NOT NULL DEFAULT 1.0,
    priority         INTEGER NOT NULL DEFAULT 0,
    created_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sources_due ON sources(is_active, next_crawl);

-- One row per crawl attempt; append-only after a terminal status
CREATE TABLE IF NOT EXISTS crawler_jobs (
    id                TEXT PRIMARY KEY,
    source_id         TEXT NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
    job_type          TEXT NOT NULL,
    status            TEXT NOT NULL DEFAULT 'pending',
    started_at        TEXT,
    completed_at      TEXT,
    updates_found     INTEGER NOT NULL DEFAULT 0,
    new_updates       INTEGER NOT NULL DEFAULT 0,
    pages_scraped     INTEGER NOT NULL DEFAULT 0,
    execution_time_ms INTEGER,
    error_message     TEXT,
    sample_json       TEXT,
    created_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_jobs_source ON crawler_jobs(source_id);

-- Canonical regulatory updates; (title, source_url) is the dedup key
CREATE TABLE IF NOT EXISTS regulatory_updates (
    id             TEXT PRIMARY KEY,
    source_id      TEXT NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
    regulation_ref TEXT,
    title          TEXT NOT NULL,
    description    TEXT NOT NULL,
    content        TEXT,
    update_type    TEXT NOT NULL,
    published_date TEXT,
    effective_date TEXT,
    source_url     TEXT NOT NULL,
    document_url   TEXT,
    status         TEXT NOT NULL DEFAULT 'pending',
    impact         TEXT NOT NULL DEFAULT 'medium',
    keywords_json  TEXT NOT NULL DEFAULT '[]',
    confidence     REAL NOT NULL DEFAULT 0.5,
    created_at     TEXT NOT NULL,
    UNIQUE(title, source_url)
);

CREATE INDEX IF NOT EXISTS idx_updates_source ON regulatory_updates(source_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
