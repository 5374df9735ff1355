//! Lu.ma acquisition: fetch the event page and read the `"event": {...}` JSON
//! fragment embedded in it. The fragment is often cut short in the page
//! source, so fields are located one by one inside the event object instead
//! of parsing it whole.

use super::extract::{
    bounded_slice, enclosed_body, find_opener, json_number_field, json_string_field,
    member_object, top_level_members,
};
use super::{fetch_html, AcquireContext, Acquirer, PageFetchSettings};
use crate::app::ports::HttpClientPort;
use crate::error::{ImportError, Result};
use crate::types::{ClassifiedTarget, LumaPageFields, RawAcquiredItem};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Bytes after the `"event": {` opener searched for event fields.
const EVENT_WINDOW: usize = 64 * 1024;
/// Hosts usually follow the event object, so they get a wider window.
const HOSTS_WINDOW: usize = 4 * EVENT_WINDOW;

pub struct DirectPageAcquirer {
    http: Arc<dyn HttpClientPort>,
    settings: PageFetchSettings,
}

impl DirectPageAcquirer {
    pub fn new(http: Arc<dyn HttpClientPort>, settings: PageFetchSettings) -> Self {
        Self { http, settings }
    }
}

#[async_trait]
impl Acquirer for DirectPageAcquirer {
    #[instrument(skip(self, target, ctx), fields(platform = %target.platform, url = %target.url))]
    async fn acquire(
        &self,
        target: &ClassifiedTarget,
        ctx: &AcquireContext,
    ) -> Result<Vec<RawAcquiredItem>> {
        let html = fetch_html(self.http.as_ref(), target.url.as_str(), &self.settings, ctx).await?;
        debug!(bytes = html.len(), "Event page fetched");

        match extract_luma_event(&html) {
            Some(fields) => {
                info!(name = %fields.name, has_start = fields.start_at.is_some(), "Extracted embedded event");
                Ok(vec![RawAcquiredItem::LumaPage(fields)])
            }
            None => Err(ImportError::NoDataFound {
                url: target.url.to_string(),
            }),
        }
    }
}

/// Pulls event fields out of a Lu.ma page. `None` when no event name is found.
///
/// Scalar fields come from the event object's own members only; nested
/// objects such as the calendar or featured events never supply them.
pub fn extract_luma_event(html: &str) -> Option<LumaPageFields> {
    let start = find_opener(html, "event", '{')?;
    let event = enclosed_body(bounded_slice(html, start, EVENT_WINDOW));
    let members = top_level_members(event);

    let name = json_string_field(&members, "name")?;

    let geo = member_object(event, "geo_address_info")
        .map(top_level_members)
        .unwrap_or_default();
    let coordinates = member_object(event, "coordinate")
        .map(top_level_members)
        .unwrap_or_default();

    let host_name = find_opener(&html[start..], "hosts", '[')
        .map(|idx| enclosed_body(bounded_slice(&html[start..], idx, HOSTS_WINDOW)))
        .and_then(|hosts| {
            let first = hosts.find('{')?;
            json_string_field(&top_level_members(enclosed_body(&hosts[first + 1..])), "name")
        });

    Some(LumaPageFields {
        name,
        start_at: json_string_field(&members, "start_at"),
        end_at: json_string_field(&members, "end_at"),
        description: json_string_field(&members, "description")
            .or_else(|| json_string_field(&members, "description_short")),
        address: json_string_field(&geo, "full_address"),
        city: json_string_field(&geo, "city"),
        place_name: json_string_field(&geo, "address")
            .or_else(|| json_string_field(&geo, "place_name")),
        latitude: json_number_field(&coordinates, "latitude"),
        longitude: json_number_field(&coordinates, "longitude"),
        cover_url: json_string_field(&members, "cover_url"),
        host_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title>Sunset Jam</title></head><body>
<script id="__NEXT_DATA__" type="application/json">{"props":{"pageProps":{"initialData":{"data":{
"event":{"api_id":"evt-1","name":"Sunset Jam","start_at":"2025-01-10T18:00:00Z","end_at":"2025-01-10T21:00:00.000Z",
"cover_url":"https://images.lumacdn.com/cover.png","description_short":"Bring an instrument & friends",
"coordinate":{"latitude":34.0195,"longitude":-118.4912},
"geo_address_info":{"city":"Santa Monica","address":"Tongva Park","full_address":"1615 Ocean Ave, Santa Monica, CA"}},
"hosts":[{"api_id":"usr-1","name":"Ana Rivera"}]}}}}</script></body></html>"#;

    #[test]
    fn test_extracts_embedded_event_fields() {
        let fields = extract_luma_event(PAGE).unwrap();
        assert_eq!(fields.name, "Sunset Jam");
        assert_eq!(fields.start_at.as_deref(), Some("2025-01-10T18:00:00Z"));
        assert_eq!(fields.end_at.as_deref(), Some("2025-01-10T21:00:00.000Z"));
        assert_eq!(fields.description.as_deref(), Some("Bring an instrument & friends"));
        assert_eq!(fields.city.as_deref(), Some("Santa Monica"));
        assert_eq!(fields.place_name.as_deref(), Some("Tongva Park"));
        assert_eq!(fields.address.as_deref(), Some("1615 Ocean Ave, Santa Monica, CA"));
        assert_eq!(fields.latitude, Some(34.0195));
        assert_eq!(fields.longitude, Some(-118.4912));
        assert_eq!(fields.cover_url.as_deref(), Some("https://images.lumacdn.com/cover.png"));
        assert_eq!(fields.host_name.as_deref(), Some("Ana Rivera"));
    }

    #[test]
    fn test_truncated_fragment_keeps_what_is_present() {
        let page = r#"<script>{"event":{"name":"Partial Meetup","start_at":"2025-02-01T10:00:00Z","descr"#;
        let fields = extract_luma_event(page).unwrap();
        assert_eq!(fields.name, "Partial Meetup");
        assert!(fields.description.is_none());
        assert!(fields.city.is_none());
        assert!(fields.host_name.is_none());
    }

    #[test]
    fn test_nested_names_do_not_become_the_title() {
        let page = r#"<script>{"event":{"calendar":{"name":"Venice Calendar","start_at":"2020-01-01T00:00:00Z"},
"name":"Sunset Jam","start_at":"2025-01-10T18:00:00Z"},"hosts":[{"name":"Ana Rivera"}]}</script>"#;
        let fields = extract_luma_event(page).unwrap();
        assert_eq!(fields.name, "Sunset Jam");
        assert_eq!(fields.start_at.as_deref(), Some("2025-01-10T18:00:00Z"));
        assert_eq!(fields.host_name.as_deref(), Some("Ana Rivera"));
    }

    #[test]
    fn test_missing_fields_are_not_taken_from_later_records() {
        let page = r#"<script>{"event":{"name":"Sunset Jam"},"featured":[{"start_at":"2030-12-31T00:00:00Z",
"description":"Not ours","cover_url":"https://images.lumacdn.com/other.png",
"geo_address_info":{"city":"Elsewhere"}}]}</script>"#;
        let fields = extract_luma_event(page).unwrap();
        assert_eq!(fields.name, "Sunset Jam");
        assert!(fields.start_at.is_none());
        assert!(fields.description.is_none());
        assert!(fields.cover_url.is_none());
        assert!(fields.city.is_none());
    }

    #[test]
    fn test_missing_name_or_fragment_is_none() {
        assert!(extract_luma_event("<html><body>No data</body></html>").is_none());
        assert!(extract_luma_event(r#"{"event":{"start_at":"2025-02-01T10:00:00Z"}}"#).is_none());
    }
}
