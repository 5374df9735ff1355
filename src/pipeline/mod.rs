//! Event import pipeline: classification, acquisition, normalization,
//! deduplication and persistence.

pub mod acquire;
pub mod classify;
pub mod dedup;
pub mod normalize;
pub mod orchestrator;
pub mod persist;

pub use classify::{canonical_source_url, classify, PlatformConfig};
pub use dedup::Deduplicator;
pub use orchestrator::ImportOrchestrator;
pub use persist::{PersistOutcome, Persister};
