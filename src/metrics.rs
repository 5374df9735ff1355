//! Import pipeline metrics.
//!
//! Counters and histograms are recorded through the `metrics` facade. Nothing is
//! exported unless `init_metrics` installs the Prometheus recorder.

use crate::types::Platform;
use std::net::SocketAddr;
use tracing::{info, warn};

pub const RUNS_TOTAL: &str = "importer_runs_total";
pub const REJECTED_TOTAL: &str = "importer_rejected_total";
pub const ACQUIRE_ERRORS_TOTAL: &str = "importer_acquire_errors_total";
pub const ACQUIRE_DURATION_SECONDS: &str = "importer_acquire_duration_seconds";
pub const ITEMS_TOTAL: &str = "importer_items_total";
pub const NORMALIZED_TOTAL: &str = "importer_normalized_total";

/// Installs the Prometheus exporter when `IMPORTER_METRICS_ADDR` is set.
pub fn init_metrics() {
    let addr = match std::env::var("IMPORTER_METRICS_ADDR") {
        Ok(v) if !v.trim().is_empty() => v,
        _ => return,
    };

    match addr.parse::<SocketAddr>() {
        Ok(addr) => {
            let result = metrics_exporter_prometheus::PrometheusBuilder::new()
                .with_http_listener(addr)
                .install();
            match result {
                Ok(()) => info!("Prometheus exporter listening on http://{}/metrics", addr),
                Err(e) => warn!("Failed to install Prometheus exporter: {}", e),
            }
        }
        Err(_) => warn!("Invalid IMPORTER_METRICS_ADDR '{}', metrics disabled", addr),
    }
}

pub struct ImportMetrics;

impl ImportMetrics {
    pub fn record_run(platform: Platform) {
        ::metrics::counter!(RUNS_TOTAL, "platform" => platform.as_str()).increment(1);
    }

    pub fn record_rejected(code: &'static str) {
        ::metrics::counter!(REJECTED_TOTAL, "reason" => code).increment(1);
    }

    pub fn record_acquire(platform: Platform, duration_secs: f64, item_count: usize) {
        ::metrics::histogram!(ACQUIRE_DURATION_SECONDS, "platform" => platform.as_str())
            .record(duration_secs);
        ::metrics::counter!(ITEMS_TOTAL, "platform" => platform.as_str(), "stage" => "acquired")
            .increment(item_count as u64);
    }

    pub fn record_acquire_error(platform: Platform, code: &'static str) {
        ::metrics::counter!(ACQUIRE_ERRORS_TOTAL, "platform" => platform.as_str(), "reason" => code)
            .increment(1);
    }

    /// `stage` is one of `imported`, `skipped` or `failed`.
    pub fn record_item(platform: Platform, stage: &'static str) {
        ::metrics::counter!(ITEMS_TOTAL, "platform" => platform.as_str(), "stage" => stage)
            .increment(1);
    }

    pub fn record_normalized(platform: Platform, ok: bool) {
        let result = if ok { "ok" } else { "rejected" };
        ::metrics::counter!(NORMALIZED_TOTAL, "platform" => platform.as_str(), "result" => result)
            .increment(1);
    }
}
