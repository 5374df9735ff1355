use url::Url;

use super::base::{
    unexpected_shape, NormalizeContext, NormalizeError, NormalizerUtils, SourceNormalizer,
};
use crate::pipeline::classify::canonical_item_url;
use crate::types::{Platform, RawAcquiredItem, RawImportedEvent};

/// Normalizer for pages read through their OpenGraph tags.
pub struct OpenGraphNormalizer;

impl OpenGraphNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// The page's own `og:url` when it points at the same site as the submitted URL.
    fn source_url(declared: Option<&str>, submitted: &str) -> String {
        let host = |u: &str| {
            Url::parse(u)
                .ok()
                .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_ascii_lowercase()))
        };
        declared
            .and_then(|d| canonical_item_url(d, Platform::OpengraphGeneric))
            .filter(|d| host(d).is_some() && host(d) == host(submitted))
            .unwrap_or_else(|| submitted.to_string())
    }
}

impl Default for OpenGraphNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceNormalizer for OpenGraphNormalizer {
    fn normalize(
        &self,
        item: &RawAcquiredItem,
        ctx: &NormalizeContext,
    ) -> Result<RawImportedEvent, NormalizeError> {
        let page = match item {
            RawAcquiredItem::OpenGraph(fields) => fields,
            other => return Err(unexpected_shape(ctx.platform, other)),
        };

        Ok(RawImportedEvent {
            source_url: Self::source_url(page.canonical_url.as_deref(), &ctx.source_url),
            title: NormalizerUtils::require_title(Some(page.title.clone()))?,
            description: NormalizerUtils::clean_description(page.description.clone()),
            starts_at: page
                .start_date
                .as_deref()
                .and_then(NormalizerUtils::parse_datetime),
            ends_at: None,
            location_name: None,
            address: None,
            city: None,
            latitude: None,
            longitude: None,
            organizer_name: page.organizer.clone(),
            image_url: page.image.clone(),
            is_free: true,
            price: None,
        })
    }

    fn name(&self) -> &str {
        "OpenGraph"
    }
}
