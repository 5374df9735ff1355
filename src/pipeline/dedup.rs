use std::sync::Arc;

use tracing::debug;

use crate::error::{ImportError, Result};
use crate::storage::{CanonicalEventRecord, EventStore};

/// Existence check on the store's unique source URL. No fuzzy matching.
#[derive(Clone)]
pub struct Deduplicator {
    store: Arc<dyn EventStore>,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    pub async fn exists(&self, source_url: &str) -> Result<Option<CanonicalEventRecord>> {
        let found = self
            .store
            .find_by_source_url(source_url)
            .await
            .map_err(|e| ImportError::PersistenceFailure {
                message: e.to_string(),
            })?;
        if let Some(record) = &found {
            debug!(source_url, existing_id = %record.id, "Source URL already imported");
        }
        Ok(found)
    }
}
