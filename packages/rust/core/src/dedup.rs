//! Deduplication against already-persisted updates.
//!
//! The dedup key is `(title, source_url)`. This read-side check lets the
//! pipeline skip classification work for known items; the database unique
//! constraint on the same pair is the authoritative guard, so a concurrent
//! crawl inserting the same item between check and insert is still caught
//! at write time.

use regmonitor_shared::{ExtractedUpdate, Result};
use regmonitor_storage::Storage;

/// Read-side duplicate check over persisted updates.
pub struct Deduplicator<'a> {
    storage: &'a Storage,
}

impl<'a> Deduplicator<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Whether an update with this candidate's `(title, source_url)` pair
    /// already exists.
    pub async fn is_duplicate(&self, candidate: &ExtractedUpdate) -> Result<bool> {
        self.storage
            .update_exists(&candidate.title, &candidate.link)
            .await
    }
}
