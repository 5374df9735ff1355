//! Acquisition: turns a classified target into raw, platform-shaped items.

pub mod broker;
pub mod direct_page;
pub mod extract;
pub mod opengraph;

pub use broker::{BrokerAcquirer, BrokerSettings};
pub use direct_page::DirectPageAcquirer;
pub use opengraph::OpenGraphAcquirer;

use crate::app::ports::{HttpClientPort, HttpRequest, TransportError};
use crate::error::{truncate_for_log, ImportError, Result, MAX_UPSTREAM_SNIPPET};
use crate::types::{ClassifiedTarget, RawAcquiredItem};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Per-run limits shared by every acquirer call.
#[derive(Debug, Clone)]
pub struct AcquireContext {
    pub cancel: CancellationToken,
    deadline: Instant,
    processing_buffer: Duration,
}

impl AcquireContext {
    pub fn new(cancel: CancellationToken, deadline: Instant, processing_buffer: Duration) -> Self {
        Self {
            cancel,
            deadline,
            processing_buffer,
        }
    }

    /// Timeout for one network call: the configured limit, capped so the
    /// processing buffer is still left before the request deadline.
    pub fn budget(&self, configured: Duration) -> Duration {
        let remaining = self
            .deadline
            .saturating_duration_since(Instant::now())
            .saturating_sub(self.processing_buffer);
        configured.min(remaining)
    }
}

#[async_trait]
pub trait Acquirer: Send + Sync {
    async fn acquire(
        &self,
        target: &ClassifiedTarget,
        ctx: &AcquireContext,
    ) -> Result<Vec<RawAcquiredItem>>;
}

pub enum Bounded<T> {
    Done(T),
    TimedOut,
    Cancelled,
}

/// Runs `fut` until it finishes, `limit` elapses, or `cancel` fires. In the last
/// two cases the future is dropped, which aborts any in-flight request.
pub async fn run_bounded<F>(fut: F, limit: Duration, cancel: &CancellationToken) -> Bounded<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Bounded::Cancelled,
        res = tokio::time::timeout(limit, fut) => match res {
            Ok(value) => Bounded::Done(value),
            Err(_) => Bounded::TimedOut,
        },
    }
}

/// Page fetch settings shared by the direct-page and OpenGraph acquirers.
#[derive(Debug, Clone)]
pub struct PageFetchSettings {
    pub user_agent: String,
    pub timeout: Duration,
}

/// GETs an HTML page and returns its body as text.
pub async fn fetch_html(
    http: &dyn HttpClientPort,
    url: &str,
    settings: &PageFetchSettings,
    ctx: &AcquireContext,
) -> Result<String> {
    let limit = ctx.budget(settings.timeout);
    let request = HttpRequest::get(url)
        .header("accept", "text/html,application/xhtml+xml")
        .header("user-agent", settings.user_agent.as_str());

    debug!(url, timeout_ms = limit.as_millis() as u64, "Fetching page");
    let response = match run_bounded(http.execute(request), limit, &ctx.cancel).await {
        Bounded::Done(Ok(resp)) => resp,
        Bounded::Done(Err(TransportError::Timeout)) | Bounded::TimedOut => {
            warn!(url, "Page fetch timed out");
            return Err(ImportError::PageFetchTimeout {
                timeout_secs: limit.as_secs(),
            });
        }
        Bounded::Done(Err(e)) => {
            warn!(url, error = %e, "Page fetch failed");
            return Err(ImportError::PageFetchFailed {
                status: None,
                message: e.to_string(),
            });
        }
        Bounded::Cancelled => return Err(ImportError::Cancelled),
    };

    if !response.is_success() {
        let snippet = truncate_for_log(&response.text(), MAX_UPSTREAM_SNIPPET);
        warn!(url, status = response.status, body = %snippet, "Page fetch returned an error status");
        return Err(ImportError::PageFetchFailed {
            status: Some(response.status),
            message: format!("the page answered with HTTP {}", response.status),
        });
    }

    match response.media_type().as_deref() {
        Some("text/html") | Some("application/xhtml+xml") => Ok(response.text()),
        other => Err(ImportError::PageFetchFailed {
            status: Some(response.status),
            message: format!(
                "expected an HTML page but got {}",
                other.unwrap_or("no content type")
            ),
        }),
    }
}
