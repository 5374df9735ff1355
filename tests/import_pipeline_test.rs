mod common;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use common::{harness, harness_with, test_config, BROKER_BASE, SUNSET_JAM_PAGE};
use event_importer::error::ImportError;
use event_importer::storage::EventStore;
use event_importer::types::{ImportRequest, Platform};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn request(url: &str) -> ImportRequest {
    ImportRequest::new(url, Uuid::new_v4())
}

#[tokio::test]
async fn test_metadata_url_is_rejected_without_network() -> Result<()> {
    let h = harness();
    for url in [
        "http://169.254.169.254/latest/meta-data/",
        "http://metadata.google.internal/computeMetadata/v1/",
        "http://localhost:8080/events/1",
        "http://2130706433/",
    ] {
        let err = h
            .orchestrator
            .import_from_url(&request(url), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::UnsafeUrl { .. }), "{url}: {err:?}");
    }
    assert_eq!(h.http.request_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_unsupported_host_lists_supported_sources() -> Result<()> {
    let h = harness();
    let err = h
        .orchestrator
        .import_from_url(&request("https://example.com/events/1"), CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        ImportError::UnsupportedPlatform { supported } => {
            assert!(supported.contains("facebook.com"));
            assert!(supported.contains("meetup.com"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.http.request_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_facebook_search_counts_partial_results() -> Result<()> {
    let h = harness();
    h.http.respond_json(
        BROKER_BASE,
        201,
        &json!([
            {"name": "Jazz Brunch", "url": "https://www.facebook.com/events/1/", "utcStartDate": "2025-02-01T18:00:00Z"},
            {"name": "No Date Party", "url": "https://www.facebook.com/events/2/"},
            {"name": "Late Set", "url": "https://www.facebook.com/events/3/?ref=search", "startTimestamp": 1738465200}
        ]),
    );

    let outcome = h
        .orchestrator
        .import_from_url(
            &request("https://www.facebook.com/events/search/?q=jazz"),
            CancellationToken::new(),
        )
        .await?;

    assert_eq!(outcome.platform, Platform::FacebookSearch);
    assert!(outcome.is_multiple);
    assert_eq!(outcome.processed_count, 2);
    assert_eq!(outcome.skipped_count, 1);
    assert_eq!(outcome.error_count, 0);
    assert_eq!(outcome.details.len(), 3);
    assert!(outcome.details[1].contains("No Date Party"));
    assert_eq!(h.store.count_events().await?, 2);
    assert!(h
        .store
        .find_by_source_url("https://www.facebook.com/events/3")
        .await?
        .is_some());

    let requests = h.http.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0]
        .url
        .starts_with("https://broker.test/v2/acts/apify~facebook-events-scraper/run-sync-get-dataset-items"));
    let body: serde_json::Value = serde_json::from_slice(requests[0].body.as_deref().unwrap_or_default())?;
    assert_eq!(body["maxResults"], 50);
    assert_eq!(body["startUrls"][0]["url"], "https://www.facebook.com/events/search/?q=jazz");
    Ok(())
}

#[tokio::test]
async fn test_reimport_is_idempotent() -> Result<()> {
    let h = harness();
    h.http.respond_html("https://lu.ma/", 200, SUNSET_JAM_PAGE);

    let first = h
        .orchestrator
        .import_from_url(&request("https://lu.ma/sunset-jam"), CancellationToken::new())
        .await?;
    assert_eq!(first.processed_count, 1);

    // Tracking query and fragment resolve to the same source.
    let second = h
        .orchestrator
        .import_from_url(
            &request("https://lu.ma/sunset-jam?utm_source=newsletter#details"),
            CancellationToken::new(),
        )
        .await?;
    assert_eq!(second.processed_count, 0);
    assert_eq!(second.skipped_count, 1);
    assert!(second.details[0].contains("already imported"));
    assert_eq!(h.store.count_events().await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_luma_sunset_jam() -> Result<()> {
    let h = harness();
    h.http.respond_html("https://lu.ma/", 200, SUNSET_JAM_PAGE);

    let outcome = h
        .orchestrator
        .import_from_url(&request("https://lu.ma/sunset-jam"), CancellationToken::new())
        .await?;
    assert_eq!(outcome.processed_count, 1);
    assert_eq!(outcome.imported[0].title, "Sunset Jam");
    assert!(outcome.imported[0].slug.starts_with("sunset-jam-"));

    let record = h
        .store
        .find_by_source_url("https://lu.ma/sunset-jam")
        .await?
        .expect("event stored");
    assert_eq!(record.event.title, "Sunset Jam");
    assert_eq!(
        record.event.starts_at,
        Some(Utc.with_ymd_and_hms(2025, 1, 10, 18, 0, 0).unwrap())
    );
    assert_eq!(record.event.city.as_deref(), Some("Santa Monica"));
    assert_eq!(record.event.location_name.as_deref(), Some("Tongva Park"));
    assert_eq!(record.event.organizer_name.as_deref(), Some("Ana Rivera"));
    assert!(record.event.is_free);
    assert_eq!(record.platform, Platform::Luma);

    let page_request = &h.http.requests()[0];
    assert!(page_request
        .headers
        .iter()
        .any(|(k, v)| k == "user-agent" && v.starts_with("event-importer/")));
    Ok(())
}

#[tokio::test]
async fn test_luma_page_without_event_is_no_data() -> Result<()> {
    let h = harness();
    h.http.respond_html("https://lu.ma/", 200, "<html><body>Page not found</body></html>");
    let err = h
        .orchestrator
        .import_from_url(&request("https://lu.ma/missing"), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::NoDataFound { .. }));
    Ok(())
}

#[tokio::test]
async fn test_broker_html_is_blocked() -> Result<()> {
    let h = harness();
    h.http.respond_html(
        BROKER_BASE,
        200,
        "<!DOCTYPE html><html><body>Please verify you are human</body></html>",
    );
    let err = h
        .orchestrator
        .import_from_url(
            &request("https://www.facebook.com/events/123456/"),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::BrokerBlockedOrRateLimited { .. }), "{err:?}");
    assert_eq!(err.status_code(), 502);
    assert_eq!(h.store.count_events().await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_broker_timeout_aborts_request() -> Result<()> {
    let h = harness();
    h.http.hang(BROKER_BASE);

    let err = h
        .orchestrator
        .import_from_url(
            &request("https://www.eventbrite.com/e/rust-night-123"),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::BrokerTimeout { .. }), "{err:?}");
    assert_eq!(err.status_code(), 504);
    assert_eq!(h.http.request_count(), 1);
    assert_eq!(h.http.dropped_in_flight(), 1);
    Ok(())
}

#[tokio::test]
async fn test_cancellation_stops_broker_wait() -> Result<()> {
    let h = harness();
    h.http.hang(BROKER_BASE);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = h
        .orchestrator
        .import_from_url(&request("https://www.facebook.com/events/1/"), cancel)
        .await
        .unwrap_err();
    assert_eq!(err, ImportError::Cancelled);
    assert_eq!(h.http.dropped_in_flight(), 1);
    Ok(())
}

#[tokio::test]
async fn test_missing_broker_token_fails_before_network() -> Result<()> {
    let mut config = test_config();
    config.broker.api_token = None;
    let h = harness_with(config);
    let err = h
        .orchestrator
        .import_from_url(&request("https://www.facebook.com/events/1/"), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::BrokerGenericFailure { .. }));
    assert_eq!(h.http.request_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_single_event_without_start_is_skipped() -> Result<()> {
    let h = harness();
    h.http.respond_json(BROKER_BASE, 201, &json!([{"name": "Sometime Soon"}]));
    let outcome = h
        .orchestrator
        .import_from_url(&request("https://www.facebook.com/events/77/"), CancellationToken::new())
        .await?;
    assert!(!outcome.is_multiple);
    assert_eq!(outcome.processed_count, 0);
    assert_eq!(outcome.skipped_count, 1);
    Ok(())
}

#[tokio::test]
async fn test_single_event_rejection_returns_item_error() -> Result<()> {
    let h = harness();
    h.http.respond_json(BROKER_BASE, 201, &json!([{"name": "  ", "startDate": "2025-01-01"}]));
    let err = h
        .orchestrator
        .import_from_url(&request("https://www.facebook.com/events/78/"), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::NormalizationRejected { .. }));
    Ok(())
}

#[tokio::test]
async fn test_empty_broker_dataset_is_no_data() -> Result<()> {
    let h = harness();
    h.http.respond_json(BROKER_BASE, 201, &json!([]));
    let err = h
        .orchestrator
        .import_from_url(&request("https://www.facebook.com/events/79/"), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::NoDataFound { .. }));
    Ok(())
}

#[tokio::test]
async fn test_opengraph_page_import() -> Result<()> {
    let h = harness();
    h.http.respond_html(
        "https://www.meetup.com/",
        200,
        r#"<html><head>
        <meta property="og:title" content="Rust &amp; Coffee">
        <meta property="og:url" content="https://www.meetup.com/rust-coffee/events/42/">
        <meta property="og:image" content="https://secure.meetupstatic.com/photo.jpeg">
        </head><body>Hosted by Seattle Rustaceans</body></html>"#,
    );
    let outcome = h
        .orchestrator
        .import_from_url(
            &request("https://www.meetup.com/rust-coffee/events/42/?utm_medium=share"),
            CancellationToken::new(),
        )
        .await?;
    assert_eq!(outcome.processed_count, 1);
    let record = h
        .store
        .find_by_source_url("https://www.meetup.com/rust-coffee/events/42")
        .await?
        .expect("stored under og:url");
    assert_eq!(record.event.title, "Rust & Coffee");
    assert_eq!(record.event.organizer_name.as_deref(), Some("Seattle Rustaceans"));
    assert!(record.event.starts_at.is_none());
    Ok(())
}

#[tokio::test]
async fn test_duplicate_items_in_one_batch_store_once() -> Result<()> {
    let mut config = test_config();
    config.import.item_concurrency = 2;
    let h = harness_with(config);
    h.http.respond_json(
        BROKER_BASE,
        201,
        &json!([
            {"name": "Twice", "url": "https://www.facebook.com/events/5/", "startDate": "2025-03-01"},
            {"name": "Twice", "url": "https://www.facebook.com/events/5/?ref=x", "startDate": "2025-03-01"}
        ]),
    );
    let outcome = h
        .orchestrator
        .import_from_url(&request("https://www.facebook.com/search/events?q=twice"), CancellationToken::new())
        .await?;
    assert_eq!(outcome.processed_count, 1);
    assert_eq!(outcome.skipped_count, 1);
    assert_eq!(h.store.count_events().await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_non_object_dataset_entries_count_as_failures() -> Result<()> {
    let h = harness();
    h.http.respond_json(
        BROKER_BASE,
        201,
        &json!([
            {"name": "Open Mic", "url": "https://www.facebook.com/events/20/", "startDate": "2025-04-01T19:00:00Z"},
            "garbage",
            null,
            {"name": "Poetry Night", "url": "https://www.facebook.com/events/21/", "startDate": "2025-04-02T19:00:00Z"}
        ]),
    );
    let outcome = h
        .orchestrator
        .import_from_url(
            &request("https://www.facebook.com/events/search/?q=open+mic"),
            CancellationToken::new(),
        )
        .await?;
    assert_eq!(outcome.processed_count, 2);
    assert_eq!(outcome.skipped_count, 0);
    assert_eq!(outcome.error_count, 2);
    assert_eq!(outcome.details.len(), 4);
    assert!(outcome.details[1].starts_with("Failed: "));
    assert!(outcome.details[1].contains("string"));
    assert!(outcome.details[2].contains("null"));
    assert_eq!(h.store.count_events().await?, 2);
    Ok(())
}
