//! Canonical event storage.

#[cfg(feature = "db")]
pub mod database;
pub mod in_memory;
pub mod traits;

#[cfg(feature = "db")]
pub use database::LibsqlEventStore;
pub use in_memory::InMemoryEventStore;
pub use traits::{CanonicalEventRecord, EventStore, StoreError};
