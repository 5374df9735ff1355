#![allow(dead_code)]

pub mod mock_http;

use event_importer::config::ImporterConfig;
use event_importer::pipeline::ImportOrchestrator;
use event_importer::storage::InMemoryEventStore;
use mock_http::MockHttpClient;
use std::sync::Arc;

pub const BROKER_BASE: &str = "https://broker.test/v2/acts";

pub struct Harness {
    pub http: Arc<MockHttpClient>,
    pub store: Arc<InMemoryEventStore>,
    pub orchestrator: Arc<ImportOrchestrator>,
}

pub fn test_config() -> ImporterConfig {
    let mut config = ImporterConfig::default();
    config.broker.base_url = BROKER_BASE.to_string();
    config.broker.api_token = Some("test-token".to_string());
    config.broker.timeout_secs = 1;
    config.fetch.timeout_secs = 1;
    config.import.request_deadline_secs = 10;
    config.import.processing_buffer_secs = 1;
    config
}

pub fn harness() -> Harness {
    harness_with(test_config())
}

pub fn harness_with(config: ImporterConfig) -> Harness {
    let http = Arc::new(MockHttpClient::new());
    let store = Arc::new(InMemoryEventStore::new());
    let orchestrator = Arc::new(ImportOrchestrator::from_config(
        &config,
        http.clone(),
        store.clone(),
    ));
    Harness {
        http,
        store,
        orchestrator,
    }
}

pub const SUNSET_JAM_PAGE: &str = r#"<!DOCTYPE html><html><head><title>Sunset Jam · Luma</title></head><body>
<script id="__NEXT_DATA__" type="application/json">{"props":{"pageProps":{"initialData":{"data":{
"event":{"api_id":"evt-1","name":"Sunset Jam","start_at":"2025-01-10T18:00:00Z",
"geo_address_info":{"city":"Santa Monica","address":"Tongva Park"}},
"hosts":[{"name":"Ana Rivera"}]}}}}</script></body></html>"#;
