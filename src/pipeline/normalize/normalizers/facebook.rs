use super::base::{
    broker_object, resolve_location, resolve_price, NormalizeContext, NormalizeError,
    NormalizerUtils, SourceNormalizer,
};
use crate::pipeline::classify::canonical_item_url;
use crate::types::{Platform, RawAcquiredItem, RawImportedEvent};

/// Normalizer for Facebook event items returned by the scraping broker.
/// Handles both single-event runs and search-result batches.
pub struct FacebookNormalizer;

impl FacebookNormalizer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FacebookNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceNormalizer for FacebookNormalizer {
    fn normalize(
        &self,
        item: &RawAcquiredItem,
        ctx: &NormalizeContext,
    ) -> Result<RawImportedEvent, NormalizeError> {
        let data = broker_object(ctx.platform, item)?;

        let title = NormalizerUtils::require_title(NormalizerUtils::first_str(
            data,
            &[&["name"], &["title"]],
        ))?;

        // Search results each carry their own event URL; that is the dedup key.
        let source_url = if ctx.platform.is_batch() {
            NormalizerUtils::first_str(data, &[&["url"], &["eventUrl"]])
                .and_then(|u| canonical_item_url(&u, Platform::Facebook))
                .ok_or(NormalizeError::MissingSourceUrl)?
        } else {
            ctx.source_url.clone()
        };

        let starts_at = NormalizerUtils::first_datetime(
            data,
            &[&["utcStartDate"], &["startDate"], &["startTimestamp"], &["startTime"]],
        );
        let starts_at = NormalizerUtils::require_start(ctx.platform, starts_at, &title)?;
        let ends_at = NormalizerUtils::first_datetime(
            data,
            &[&["utcEndDate"], &["endDate"], &["endTimestamp"], &["endTime"]],
        );

        let location = resolve_location(
            NormalizerUtils::str_at(data, &["location", "name"]),
            NormalizerUtils::first_str(
                data,
                &[
                    &["location", "streetAddress"],
                    &["location", "address"],
                    &["address"],
                ],
            ),
            NormalizerUtils::first_str(
                data,
                &[&["location", "city", "name"], &["location", "city"]],
            ),
            NormalizerUtils::num_at(data, &["location", "latitude"]),
            NormalizerUtils::num_at(data, &["location", "longitude"]),
        );

        let price = NormalizerUtils::value_at(data, &["ticketsInfo", "price"])
            .or_else(|| NormalizerUtils::value_at(data, &["ticketsInfo"]))
            .or_else(|| NormalizerUtils::value_at(data, &["price"]));
        let (is_free, price) = resolve_price(NormalizerUtils::bool_at(data, &["isFree"]), price);

        Ok(RawImportedEvent {
            source_url,
            title,
            description: NormalizerUtils::clean_description(NormalizerUtils::str_at(
                data,
                &["description"],
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
                &[
                    &["organizedBy"],
                    &["organizer", "name"],
                    &["organizer"],
                    &["hosts", "0", "name"],
                ],
            ),
            image_url: NormalizerUtils::first_str(
                data,
                &[&["imageUrl"], &["coverPhoto"], &["coverPhoto", "url"], &["image"]],
            ),
            is_free,
            price,
        })
    }

    fn name(&self) -> &str {
        "Facebook"
    }
}
