use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ImportError, Result};
use crate::storage::{CanonicalEventRecord, EventStore, StoreError};
use crate::types::{Platform, RawImportedEvent};

const MAX_SLUG_TITLE_CHARS: usize = 60;

#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    Created(CanonicalEventRecord),
    /// Another writer stored the same source URL first.
    AlreadyExists(CanonicalEventRecord),
}

/// Idempotent insert of canonical events.
#[derive(Clone)]
pub struct Persister {
    store: Arc<dyn EventStore>,
}

impl Persister {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    pub async fn insert(
        &self,
        event: RawImportedEvent,
        platform: Platform,
        importing_user: Uuid,
    ) -> Result<PersistOutcome> {
        let record = CanonicalEventRecord {
            id: Uuid::new_v4(),
            slug: generate_slug(&event.title, &event.source_url),
            platform,
            imported_by: importing_user,
            created_at: Utc::now(),
            event,
        };

        match self.store.insert_event(&record).await {
            Ok(()) => {
                debug!(id = %record.id, slug = %record.slug, "Inserted event");
                Ok(PersistOutcome::Created(record))
            }
            Err(StoreError::UniqueViolation { source_url }) => {
                let existing = self
                    .store
                    .find_by_source_url(&source_url)
                    .await
                    .map_err(|e| ImportError::PersistenceFailure {
                        message: e.to_string(),
                    })?;
                match existing {
                    Some(existing) => Ok(PersistOutcome::AlreadyExists(existing)),
                    None => {
                        warn!(source_url, "Unique violation but no existing row on re-read");
                        Err(ImportError::PersistenceFailure {
                            message: format!("conflicting insert for {source_url} could not be resolved"),
                        })
                    }
                }
            }
            Err(e) => Err(ImportError::PersistenceFailure {
                message: e.to_string(),
            }),
        }
    }
}

/// Generate a URL-friendly slug: the title plus a short hash of the source URL.
pub fn generate_slug(title: &str, source_url: &str) -> String {
    let mut base = String::new();
    for c in title.to_lowercase().chars() {
        if c.is_alphanumeric() {
            base.push(c);
        } else if !base.is_empty() && !base.ends_with('-') {
            base.push('-');
        }
    }
    let base: String = base.chars().take(MAX_SLUG_TITLE_CHARS).collect();
    let base = base.trim_matches('-');

    let digest = hex::encode(Sha256::digest(source_url.as_bytes()));
    let suffix = &digest[..8];
    if base.is_empty() {
        format!("event-{suffix}")
    } else {
        format!("{base}-{suffix}")
    }
}
