use serde_json::Value;

use super::base::{
    broker_object, resolve_location, resolve_price, NormalizeContext, NormalizeError,
    NormalizerUtils, SourceNormalizer,
};
use crate::types::{RawAcquiredItem, RawImportedEvent};

/// Normalizer for Eventbrite items returned by the scraping broker.
/// Eventbrite nests most text as `{ "text": ..., "html": ... }`.
pub struct EventbriteNormalizer;

impl EventbriteNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// `date` + optional `time` joined into one parseable string.
    fn split_start(data: &Value, date_key: &str, time_key: &str) -> Option<String> {
        let date = NormalizerUtils::str_at(data, &[date_key])?;
        Some(match NormalizerUtils::str_at(data, &[time_key]) {
            Some(time) => format!("{date}T{time}"),
            None => date,
        })
    }
}

impl Default for EventbriteNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceNormalizer for EventbriteNormalizer {
    fn normalize(
        &self,
        item: &RawAcquiredItem,
        ctx: &NormalizeContext,
    ) -> Result<RawImportedEvent, NormalizeError> {
        let data = broker_object(ctx.platform, item)?;

        let title = NormalizerUtils::require_title(NormalizerUtils::first_str(
            data,
            &[&["name"], &["name", "text"]],
        ))?;

        let starts_at = NormalizerUtils::first_datetime(data, &[&["start", "utc"], &["start", "local"]])
            .or_else(|| {
                Self::split_start(data, "start_date", "start_time")
                    .and_then(|s| NormalizerUtils::parse_datetime(&s))
            })
            .or_else(|| NormalizerUtils::first_datetime(data, &[&["startDate"]]));
        let starts_at = NormalizerUtils::require_start(ctx.platform, starts_at, &title)?;

        let ends_at = NormalizerUtils::first_datetime(data, &[&["end", "utc"], &["end", "local"]])
            .or_else(|| {
                Self::split_start(data, "end_date", "end_time")
                    .and_then(|s| NormalizerUtils::parse_datetime(&s))
            })
            .or_else(|| NormalizerUtils::first_datetime(data, &[&["endDate"]]));

        let location = resolve_location(
            NormalizerUtils::str_at(data, &["venue", "name"]),
            NormalizerUtils::first_str(
                data,
                &[
                    &["venue", "address", "localized_address_display"],
                    &["venue", "address", "address_1"],
                ],
            ),
            NormalizerUtils::str_at(data, &["venue", "address", "city"]),
            NormalizerUtils::num_at(data, &["venue", "address", "latitude"])
                .or_else(|| NormalizerUtils::num_at(data, &["venue", "latitude"])),
            NormalizerUtils::num_at(data, &["venue", "address", "longitude"])
                .or_else(|| NormalizerUtils::num_at(data, &["venue", "longitude"])),
        );

        let price = NormalizerUtils::value_at(
            data,
            &["ticket_availability", "minimum_ticket_price", "display"],
        )
        .or_else(|| NormalizerUtils::value_at(data, &["price"]));
        let (is_free, price) = resolve_price(NormalizerUtils::bool_at(data, &["is_free"]), price);

        Ok(RawImportedEvent {
            source_url: ctx.source_url.clone(),
            title,
            description: NormalizerUtils::clean_description(NormalizerUtils::first_str(
                data,
                &[&["summary"], &["description"], &["description", "text"]],
            )),
            starts_at,
            ends_at,
            location_name: location.location_name,
            address: location.address,
            city: location.city,
            latitude: location.latitude,
            longitude: location.longitude,
            organizer_name: NormalizerUtils::first_str(
                data,
                &[&["organizer", "name"], &["organizer_name"]],
            ),
            image_url: NormalizerUtils::first_str(data, &[&["image", "url"], &["image_url"]]),
            is_free,
            price,
        })
    }

    fn name(&self) -> &str {
        "Eventbrite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn ctx() -> NormalizeContext {
        NormalizeContext {
            platform: Platform::Eventbrite,
            source_url: "https://www.eventbrite.com/e/rust-workshop-123".to_string(),
        }
    }

    #[test]
    fn test_maps_nested_eventbrite_shape() {
        let item = RawAcquiredItem::Broker(json!({
            "name": {"text": "Rust Workshop", "html": "Rust Workshop"},
            "summary": "Hands-on intro",
            "start": {"utc": "2025-06-07T16:00:00Z", "local": "2025-06-07T09:00:00"},
            "end": {"utc": "2025-06-07T19:00:00Z"},
            "venue": {
                "name": "Code Fellows",
                "address": {
                    "localized_address_display": "511 Boren Ave N, Seattle, WA",
                    "city": "Seattle",
                    "latitude": "47.6235",
                    "longitude": "-122.3361"
                }
            },
            "organizer": {"name": "Seattle Rust User Group"},
            "image": {"url": "https://img.evbuc.com/rust.jpg"},
            "is_free": false,
            "ticket_availability": {"minimum_ticket_price": {"display": "$20.00"}}
        }));

        let event = EventbriteNormalizer::new().normalize(&item, &ctx()).unwrap();
        assert_eq!(event.title, "Rust Workshop");
        assert_eq!(event.starts_at, Some(Utc.with_ymd_and_hms(2025, 6, 7, 16, 0, 0).unwrap()));
        assert_eq!(event.ends_at, Some(Utc.with_ymd_and_hms(2025, 6, 7, 19, 0, 0).unwrap()));
        assert_eq!(event.description.as_deref(), Some("Hands-on intro"));
        assert_eq!(event.location_name.as_deref(), Some("Code Fellows"));
        assert_eq!(event.latitude, Some(47.6235));
        assert_eq!(event.longitude, Some(-122.3361));
        assert_eq!(event.organizer_name.as_deref(), Some("Seattle Rust User Group"));
        assert_eq!(event.image_url.as_deref(), Some("https://img.evbuc.com/rust.jpg"));
        assert!(!event.is_free);
        assert_eq!(event.price.as_deref(), Some("$20.00"));
    }

    #[test]
    fn test_flat_date_and_time_fields() {
        let item = RawAcquiredItem::Broker(json!({
            "name": "Pottery Class",
            "start_date": "2025-06-07",
            "start_time": "18:30",
            "is_free": true
        }));
        let event = EventbriteNormalizer::new().normalize(&item, &ctx()).unwrap();
        assert_eq!(event.starts_at, Some(Utc.with_ymd_and_hms(2025, 6, 7, 18, 30, 0).unwrap()));
        assert!(event.is_free);
        assert!(event.price.is_none());
        assert!(event.location_name.is_none());
    }

    #[test]
    fn test_missing_start_is_a_skip() {
        let item = RawAcquiredItem::Broker(json!({"name": "Someday"}));
        assert!(EventbriteNormalizer::new().normalize(&item, &ctx()).unwrap_err().is_skip());
    }
}
