//! Broker acquisition: delegates scraping to an Apify-style actor API and reads
//! the dataset items from the synchronous run endpoint.

use super::{run_bounded, AcquireContext, Acquirer, Bounded};
use crate::app::ports::{HttpClientPort, HttpRequest, HttpResponse, TransportError};
use crate::config::ImporterConfig;
use crate::error::{truncate_for_log, ImportError, Result, MAX_UPSTREAM_SNIPPET};
use crate::types::{ClassifiedTarget, Platform, RawAcquiredItem};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};
use url::Url;

const QUOTA_MARKERS: &[&str] = &[
    "not-enough-usage",
    "usage limit",
    "monthly usage",
    "quota",
    "payment",
    "insufficient credit",
];

#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub base_url: String,
    pub api_token: Option<String>,
    pub facebook_event_profile: String,
    pub facebook_search_profile: String,
    pub eventbrite_profile: String,
    pub max_search_results: u32,
    pub timeout: Duration,
}

impl BrokerSettings {
    pub fn from_config(config: &ImporterConfig) -> Self {
        Self {
            base_url: config.broker.base_url.clone(),
            api_token: config.broker.api_token.clone(),
            facebook_event_profile: config.broker.facebook_event_profile.clone(),
            facebook_search_profile: config.broker.facebook_search_profile.clone(),
            eventbrite_profile: config.broker.eventbrite_profile.clone(),
            max_search_results: config.broker.max_search_results,
            timeout: config.broker_timeout(),
        }
    }

    fn profile_for(&self, platform: Platform) -> Option<&str> {
        match platform {
            Platform::Facebook => Some(self.facebook_event_profile.as_str()),
            Platform::FacebookSearch => Some(self.facebook_search_profile.as_str()),
            Platform::Eventbrite => Some(self.eventbrite_profile.as_str()),
            Platform::Luma | Platform::OpengraphGeneric => None,
        }
    }

    /// Run input: one page for a single event, up to `max_search_results` for a search.
    fn job_input(&self, platform: Platform, target_url: &str) -> Value {
        if platform.is_batch() {
            json!({
                "startUrls": [{ "url": target_url }],
                "maxResults": self.max_search_results,
            })
        } else {
            json!({
                "startUrls": [{ "url": target_url }],
                "maxRequestsPerCrawl": 1,
            })
        }
    }
}

pub struct BrokerAcquirer {
    http: Arc<dyn HttpClientPort>,
    settings: BrokerSettings,
}

impl BrokerAcquirer {
    pub fn new(http: Arc<dyn HttpClientPort>, settings: BrokerSettings) -> Self {
        Self { http, settings }
    }

    fn endpoint(&self, profile: &str, token: &str) -> Result<Url> {
        let raw = format!(
            "{}/{}/run-sync-get-dataset-items",
            self.settings.base_url.trim_end_matches('/'),
            profile
        );
        let mut url = Url::parse(&raw).map_err(|e| ImportError::BrokerGenericFailure {
            status: None,
            message: format!("invalid scraper endpoint: {e}"),
        })?;
        url.query_pairs_mut().append_pair("token", token);
        Ok(url)
    }
}

#[async_trait]
impl Acquirer for BrokerAcquirer {
    #[instrument(skip(self, target, ctx), fields(platform = %target.platform, url = %target.url))]
    async fn acquire(
        &self,
        target: &ClassifiedTarget,
        ctx: &AcquireContext,
    ) -> Result<Vec<RawAcquiredItem>> {
        let profile = self
            .settings
            .profile_for(target.platform)
            .ok_or_else(|| ImportError::BrokerGenericFailure {
                status: None,
                message: format!("no scraper job profile for {}", target.platform),
            })?;
        let token = self
            .settings
            .api_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ImportError::BrokerGenericFailure {
                status: None,
                message: "scraper is not configured (missing API token)".to_string(),
            })?;

        let endpoint = self.endpoint(profile, token)?;
        let input = self.settings.job_input(target.platform, target.url.as_str());
        let limit = ctx.budget(self.settings.timeout);

        info!(profile, timeout_ms = limit.as_millis() as u64, "Submitting scrape job");
        let started = Instant::now();
        let request = HttpRequest::post_json(endpoint.as_str(), &input).header("accept", "application/json");

        let response = match run_bounded(self.http.execute(request), limit, &ctx.cancel).await {
            Bounded::Done(Ok(resp)) => resp,
            Bounded::Done(Err(TransportError::Timeout)) | Bounded::TimedOut => {
                warn!(profile, elapsed_ms = started.elapsed().as_millis() as u64, "Scrape job timed out, request aborted");
                return Err(ImportError::BrokerTimeout {
                    timeout_secs: limit.as_secs(),
                });
            }
            Bounded::Done(Err(e)) => {
                warn!(profile, error = %e, "Scrape job request failed");
                return Err(ImportError::BrokerGenericFailure {
                    status: None,
                    message: e.to_string(),
                });
            }
            Bounded::Cancelled => {
                info!(profile, "Import cancelled while waiting for the scraper");
                return Err(ImportError::Cancelled);
            }
        };

        let items = interpret_response(&response)?;
        info!(
            profile,
            items = items.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scrape job finished"
        );

        // Non-object entries are passed on so the normalizer counts them as failures.
        Ok(items.into_iter().map(RawAcquiredItem::Broker).collect())
    }
}

fn looks_like_html(body: &str) -> bool {
    let head: String = body.trim_start().chars().take(512).collect::<String>().to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html") || head.contains("<html")
}

/// `error.message` / `message` from a broker error body, if it is JSON.
fn broker_error_message(body: &str) -> Option<(Option<String>, String)> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error").unwrap_or(&value);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())?
        .to_string();
    let kind = error.get("type").and_then(Value::as_str).map(str::to_string);
    Some((kind, message))
}

fn is_quota_error(kind: Option<&str>, message: &str) -> bool {
    let haystack = format!("{} {}", kind.unwrap_or_default(), message).to_ascii_lowercase();
    QUOTA_MARKERS.iter().any(|marker| haystack.contains(marker))
}

/// Classifies a broker response into dataset items or a typed error.
pub fn interpret_response(response: &HttpResponse) -> Result<Vec<Value>> {
    let body = response.text();
    let media_type = response.media_type();

    if !response.is_success() {
        let snippet = truncate_for_log(&body, MAX_UPSTREAM_SNIPPET);
        warn!(status = response.status, body = %snippet, "Scraper returned an error status");

        let parsed = broker_error_message(&body);
        if response.status == 402
            || parsed
                .as_ref()
                .is_some_and(|(kind, msg)| is_quota_error(kind.as_deref(), msg))
        {
            let message = parsed
                .map(|(_, msg)| truncate_for_log(&msg, MAX_UPSTREAM_SNIPPET))
                .unwrap_or_else(|| "the scraping account has run out of credit".to_string());
            return Err(ImportError::BrokerQuotaExhausted { message });
        }
        if media_type.as_deref() == Some("text/html") || looks_like_html(&body) {
            return Err(ImportError::BrokerBlockedOrRateLimited {
                content_type: media_type.unwrap_or_else(|| "text/html".to_string()),
            });
        }
        let message = parsed
            .map(|(_, msg)| truncate_for_log(&msg, MAX_UPSTREAM_SNIPPET))
            .unwrap_or(snippet);
        return Err(ImportError::BrokerGenericFailure {
            status: Some(response.status),
            message,
        });
    }

    let declared_json = media_type
        .as_deref()
        .is_some_and(|mt| mt == "application/json" || mt.ends_with("+json"));
    if !declared_json {
        let content_type = media_type.unwrap_or_else(|| "no content type".to_string());
        if content_type == "text/html" || looks_like_html(&body) {
            warn!(content_type = %content_type, "Scraper returned HTML instead of JSON");
            return Err(ImportError::BrokerBlockedOrRateLimited { content_type });
        }
        return Err(ImportError::BrokerGenericFailure {
            status: Some(response.status),
            message: format!("unexpected response type {content_type}"),
        });
    }

    let value: Value = serde_json::from_str(&body).map_err(|e| {
        warn!(error = %e, body = %truncate_for_log(&body, MAX_UPSTREAM_SNIPPET), "Scraper returned malformed JSON");
        ImportError::BrokerGenericFailure {
            status: Some(response.status),
            message: "the scraper returned malformed JSON".to_string(),
        }
    })?;

    match value {
        Value::Array(items) => Ok(items),
        other => {
            let message = broker_error_message(&other.to_string())
                .map(|(_, msg)| truncate_for_log(&msg, MAX_UPSTREAM_SNIPPET))
                .unwrap_or_else(|| "expected a list of results".to_string());
            Err(ImportError::BrokerGenericFailure {
                status: Some(response.status),
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, content_type: Option<&str>, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            content_type: content_type.map(str::to_string),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_json_array_is_returned() {
        let items = interpret_response(&response(
            201,
            Some("application/json; charset=utf-8"),
            r#"[{"name":"A"},{"name":"B"}]"#,
        ))
        .unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_html_content_type_is_blocked_not_parse_error() {
        let err = interpret_response(&response(200, Some("text/html; charset=utf-8"), "<!DOCTYPE html><html></html>"))
            .unwrap_err();
        assert_eq!(
            err,
            ImportError::BrokerBlockedOrRateLimited {
                content_type: "text/html".to_string()
            }
        );
    }

    #[test]
    fn test_html_body_without_content_type_is_blocked() {
        let err = interpret_response(&response(200, None, "  <html><body>captcha</body></html>")).unwrap_err();
        assert!(matches!(err, ImportError::BrokerBlockedOrRateLimited { .. }));
    }

    #[test]
    fn test_payment_required_is_quota() {
        let err = interpret_response(&response(
            402,
            Some("application/json"),
            r#"{"error":{"type":"not-enough-usage-to-run-paid-actor","message":"You have exceeded your monthly usage"}}"#,
        ))
        .unwrap_err();
        assert_eq!(
            err,
            ImportError::BrokerQuotaExhausted {
                message: "You have exceeded your monthly usage".to_string()
            }
        );
    }

    #[test]
    fn test_generic_failure_surfaces_broker_message() {
        let err = interpret_response(&response(
            400,
            Some("application/json"),
            r#"{"error":{"type":"invalid-input","message":"Field startUrls is required"}}"#,
        ))
        .unwrap_err();
        assert_eq!(
            err,
            ImportError::BrokerGenericFailure {
                status: Some(400),
                message: "Field startUrls is required".to_string()
            }
        );
    }

    #[test]
    fn test_malformed_json_and_non_array() {
        let err = interpret_response(&response(200, Some("application/json"), "[{")).unwrap_err();
        assert!(matches!(err, ImportError::BrokerGenericFailure { .. }));

        let err = interpret_response(&response(200, Some("application/json"), r#"{"error":{"message":"run failed"}}"#))
            .unwrap_err();
        assert_eq!(
            err,
            ImportError::BrokerGenericFailure {
                status: Some(200),
                message: "run failed".to_string()
            }
        );
    }

    #[test]
    fn test_plain_text_is_generic_failure() {
        let err = interpret_response(&response(200, Some("text/plain"), "ok")).unwrap_err();
        assert!(matches!(err, ImportError::BrokerGenericFailure { .. }));
    }

    #[test]
    fn test_job_input_per_profile() {
        let settings = BrokerSettings::from_config(&ImporterConfig::default());
        let single = settings.job_input(Platform::Facebook, "https://facebook.com/events/1");
        assert_eq!(single["maxRequestsPerCrawl"], 1);
        assert!(single.get("maxResults").is_none());

        let search = settings.job_input(Platform::FacebookSearch, "https://facebook.com/events/search?q=a");
        assert_eq!(search["maxResults"], 50);
        assert_eq!(search["startUrls"][0]["url"], "https://facebook.com/events/search?q=a");
    }
}
