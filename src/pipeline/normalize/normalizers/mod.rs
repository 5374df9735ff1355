// Base trait and utilities for platform-specific normalizers
pub mod base;

pub mod eventbrite;
pub mod facebook;
pub mod luma;
pub mod opengraph;

pub use base::{MetricsNormalizer, NormalizeContext, NormalizeError, SourceNormalizer};
pub use eventbrite::EventbriteNormalizer;
pub use facebook::FacebookNormalizer;
pub use luma::LumaNormalizer;
pub use opengraph::OpenGraphNormalizer;
