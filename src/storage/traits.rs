use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::types::{Platform, RawImportedEvent};

/// Persisted event row. Created once by the import pipeline, never mutated by it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalEventRecord {
    pub id: Uuid,
    pub slug: String,
    pub platform: Platform,
    pub imported_by: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: RawImportedEvent,
}

impl CanonicalEventRecord {
    pub fn source_url(&self) -> &str {
        &self.event.source_url
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("an event with source URL {source_url} already exists")]
    UniqueViolation { source_url: String },

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Store contract used by the dedup and persist steps.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn find_by_source_url(
        &self,
        source_url: &str,
    ) -> Result<Option<CanonicalEventRecord>, StoreError>;

    /// Fails with `StoreError::UniqueViolation` if `source_url` is already stored.
    async fn insert_event(&self, record: &CanonicalEventRecord) -> Result<(), StoreError>;

    async fn count_events(&self) -> Result<u64, StoreError>;
}
