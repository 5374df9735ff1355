//! Normalization: platform-shaped raw items into canonical `RawImportedEvent`s.

pub mod normalizers;
pub mod registry;

pub use normalizers::{NormalizeContext, NormalizeError, SourceNormalizer};
pub use registry::NormalizationRegistry;
