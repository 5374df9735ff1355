use super::traits::{CanonicalEventRecord, EventStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// In-memory store for development and tests. Keyed by source URL, which
/// gives it the same uniqueness rule as the database table.
#[derive(Clone)]
pub struct InMemoryEventStore {
    events: Arc<Mutex<HashMap<String, CanonicalEventRecord>>>,
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, CanonicalEventRecord>>, StoreError> {
        self.events
            .lock()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn find_by_source_url(
        &self,
        source_url: &str,
    ) -> Result<Option<CanonicalEventRecord>, StoreError> {
        Ok(self.lock()?.get(source_url).cloned())
    }

    async fn insert_event(&self, record: &CanonicalEventRecord) -> Result<(), StoreError> {
        let mut events = self.lock()?;
        if events.contains_key(record.source_url()) {
            return Err(StoreError::UniqueViolation {
                source_url: record.source_url().to_string(),
            });
        }
        events.insert(record.source_url().to_string(), record.clone());
        debug!("Created event: {} with id {}", record.event.title, record.id);
        Ok(())
    }

    async fn count_events(&self) -> Result<u64, StoreError> {
        Ok(self.lock()?.len() as u64)
    }
}
