use super::base::{
    resolve_location, unexpected_shape, NormalizeContext, NormalizeError, NormalizerUtils,
    SourceNormalizer,
};
use crate::types::{RawAcquiredItem, RawImportedEvent};

/// Normalizer for fields read from a Lu.ma event page.
/// A missing start time is tolerated here.
pub struct LumaNormalizer;

impl LumaNormalizer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LumaNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceNormalizer for LumaNormalizer {
    fn normalize(
        &self,
        item: &RawAcquiredItem,
        ctx: &NormalizeContext,
    ) -> Result<RawImportedEvent, NormalizeError> {
        let page = match item {
            RawAcquiredItem::LumaPage(fields) => fields,
            other => return Err(unexpected_shape(ctx.platform, other)),
        };

        let location = resolve_location(
            page.place_name.clone(),
            page.address.clone(),
            page.city.clone(),
            page.latitude,
            page.longitude,
        );

        let title = NormalizerUtils::require_title(Some(page.name.clone()))?;
        let starts_at = NormalizerUtils::require_start(
            ctx.platform,
            page.start_at.as_deref().and_then(NormalizerUtils::parse_datetime),
            &title,
        )?;

        Ok(RawImportedEvent {
            source_url: ctx.source_url.clone(),
            title,
            description: NormalizerUtils::clean_description(page.description.clone()),
            starts_at,
            ends_at: page.end_at.as_deref().and_then(NormalizerUtils::parse_datetime),
            location_name: location.location_name,
            address: location.address,
            city: location.city,
            latitude: location.latitude,
            longitude: location.longitude,
            organizer_name: page.host_name.clone(),
            image_url: page.cover_url.clone(),
            is_free: true,
            price: None,
        })
    }

    fn name(&self) -> &str {
        "Lu.ma"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LumaPageFields, Platform};
    use chrono::{TimeZone, Utc};

    fn ctx() -> NormalizeContext {
        NormalizeContext {
            platform: Platform::Luma,
            source_url: "https://lu.ma/sunset-jam".to_string(),
        }
    }

    #[test]
    fn test_maps_page_fields() {
        let item = RawAcquiredItem::LumaPage(LumaPageFields {
            name: "Sunset Jam".into(),
            start_at: Some("2025-01-10T18:00:00Z".into()),
            city: Some("Santa Monica".into()),
            host_name: Some("Ana Rivera".into()),
            ..Default::default()
        });
        let event = LumaNormalizer::new().normalize(&item, &ctx()).unwrap();
        assert_eq!(event.title, "Sunset Jam");
        assert_eq!(event.source_url, "https://lu.ma/sunset-jam");
        assert_eq!(event.starts_at, Some(Utc.with_ymd_and_hms(2025, 1, 10, 18, 0, 0).unwrap()));
        assert_eq!(event.city.as_deref(), Some("Santa Monica"));
        assert_eq!(event.organizer_name.as_deref(), Some("Ana Rivera"));
        assert!(event.is_free);
    }

    #[test]
    fn test_missing_start_is_tolerated() {
        let item = RawAcquiredItem::LumaPage(LumaPageFields {
            name: "Pop-up".into(),
            start_at: Some("TBD".into()),
            ..Default::default()
        });
        let event = LumaNormalizer::new().normalize(&item, &ctx()).unwrap();
        assert!(event.starts_at.is_none());
    }

    #[test]
    fn test_rejects_broker_items() {
        let item = RawAcquiredItem::Broker(serde_json::json!({"name": "x"}));
        assert!(matches!(
            LumaNormalizer::new().normalize(&item, &ctx()),
            Err(NormalizeError::UnexpectedShape { .. })
        ));
    }
}
