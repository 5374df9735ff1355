use std::collections::HashMap;

use super::normalizers::{
    EventbriteNormalizer, FacebookNormalizer, LumaNormalizer, MetricsNormalizer,
    NormalizeContext, NormalizeError, OpenGraphNormalizer, SourceNormalizer,
};
use crate::types::{Platform, RawAcquiredItem, RawImportedEvent};

/// Registry for platform-specific normalization strategies
pub struct NormalizationRegistry {
    normalizers: HashMap<Platform, Box<dyn SourceNormalizer>>,
}

impl NormalizationRegistry {
    /// Create a new registry with every built-in normalizer, each wrapped with metrics
    pub fn new() -> Self {
        let mut registry = Self {
            normalizers: HashMap::new(),
        };
        registry.register(Platform::Facebook, Box::new(MetricsNormalizer::new(FacebookNormalizer::new())));
        registry.register(
            Platform::FacebookSearch,
            Box::new(MetricsNormalizer::new(FacebookNormalizer::new())),
        );
        registry.register(
            Platform::Eventbrite,
            Box::new(MetricsNormalizer::new(EventbriteNormalizer::new())),
        );
        registry.register(Platform::Luma, Box::new(MetricsNormalizer::new(LumaNormalizer::new())));
        registry.register(
            Platform::OpengraphGeneric,
            Box::new(MetricsNormalizer::new(OpenGraphNormalizer::new())),
        );
        registry
    }

    pub fn register(&mut self, platform: Platform, normalizer: Box<dyn SourceNormalizer>) {
        self.normalizers.insert(platform, normalizer);
    }

    pub fn get_normalizer(&self, platform: Platform) -> Option<&dyn SourceNormalizer> {
        self.normalizers.get(&platform).map(|n| n.as_ref())
    }

    /// Normalize one item with the normalizer registered for the run's platform
    pub fn normalize(
        &self,
        item: &RawAcquiredItem,
        ctx: &NormalizeContext,
    ) -> Result<RawImportedEvent, NormalizeError> {
        match self.get_normalizer(ctx.platform) {
            Some(normalizer) => normalizer.normalize(item, ctx),
            None => Err(NormalizeError::UnexpectedShape {
                platform: ctx.platform,
                detail: "no normalizer registered".to_string(),
            }),
        }
    }
}

impl Default for NormalizationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_covers_every_platform() {
        let registry = NormalizationRegistry::new();
        for platform in [
            Platform::Facebook,
            Platform::FacebookSearch,
            Platform::Eventbrite,
            Platform::Luma,
            Platform::OpengraphGeneric,
        ] {
            assert!(registry.get_normalizer(platform).is_some(), "{platform}");
        }
        assert_eq!(registry.get_normalizer(Platform::Luma).map(|n| n.name()), Some("Lu.ma"));
    }

    #[test]
    fn test_dispatches_on_context_platform() {
        let registry = NormalizationRegistry::new();
        let ctx = NormalizeContext {
            platform: Platform::Eventbrite,
            source_url: "https://www.eventbrite.com/e/1".to_string(),
        };
        let item = RawAcquiredItem::Broker(json!({"name": "Meetup", "start_date": "2025-01-01"}));
        let event = registry.normalize(&item, &ctx).unwrap();
        assert_eq!(event.title, "Meetup");
    }
}
