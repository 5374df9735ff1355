//! Entry point of the import pipeline.
//!
//! A run moves through `Validating -> Classifying -> Acquiring`, then each
//! acquired item goes through `Normalizing -> Deduplicating -> Persisting`
//! on its own, and the run ends in `Summarizing`. Anything that fails before
//! acquisition finishes aborts the run; after that, item failures are only
//! counted.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant as StdInstant};

use futures::stream::{self, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::acquire::{
    AcquireContext, Acquirer, BrokerAcquirer, BrokerSettings, DirectPageAcquirer,
    OpenGraphAcquirer, PageFetchSettings,
};
use super::classify::{canonical_source_url, classify, PlatformConfig};
use super::dedup::Deduplicator;
use super::normalize::{NormalizationRegistry, NormalizeContext};
use super::persist::{PersistOutcome, Persister};
use crate::app::ports::HttpClientPort;
use crate::config::ImporterConfig;
use crate::error::{ImportError, Result};
use crate::metrics::ImportMetrics;
use crate::security;
use crate::storage::EventStore;
use crate::types::{
    AcquisitionStrategy, ClassifiedTarget, ImportOutcome, ImportRequest, ImportedEventRef,
    Platform, RawAcquiredItem,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImportState {
    Validating,
    Classifying,
    Acquiring,
    Normalizing,
    Deduplicating,
    Persisting,
    Summarizing,
}

impl fmt::Display for ImportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportState::Validating => "validating",
            ImportState::Classifying => "classifying",
            ImportState::Acquiring => "acquiring",
            ImportState::Normalizing => "normalizing",
            ImportState::Deduplicating => "deduplicating",
            ImportState::Persisting => "persisting",
            ImportState::Summarizing => "summarizing",
        };
        f.write_str(name)
    }
}

fn enter(state: ImportState) {
    debug!(state = %state, "Import state");
}

/// Result of one item's normalize/dedup/persist pass.
#[derive(Debug)]
enum ItemOutcome {
    Imported(ImportedEventRef),
    Skipped(String),
    Failed(ImportError),
}

pub struct ImportOrchestrator {
    platforms: PlatformConfig,
    broker: Arc<dyn Acquirer>,
    direct_page: Arc<dyn Acquirer>,
    opengraph: Arc<dyn Acquirer>,
    registry: NormalizationRegistry,
    dedup: Deduplicator,
    persister: Persister,
    request_deadline: Duration,
    processing_buffer: Duration,
    item_concurrency: usize,
}

impl ImportOrchestrator {
    pub fn from_config(
        config: &ImporterConfig,
        http: Arc<dyn HttpClientPort>,
        store: Arc<dyn EventStore>,
    ) -> Self {
        let page = PageFetchSettings {
            user_agent: config.fetch.user_agent.clone(),
            timeout: config.page_fetch_timeout(),
        };
        Self {
            platforms: PlatformConfig::new(config.import.opengraph_hosts.clone()),
            broker: Arc::new(BrokerAcquirer::new(
                http.clone(),
                BrokerSettings::from_config(config),
            )),
            direct_page: Arc::new(DirectPageAcquirer::new(http.clone(), page.clone())),
            opengraph: Arc::new(OpenGraphAcquirer::new(http, page)),
            registry: NormalizationRegistry::new(),
            dedup: Deduplicator::new(store.clone()),
            persister: Persister::new(store),
            request_deadline: config.request_deadline(),
            processing_buffer: config.processing_buffer(),
            item_concurrency: config.import.item_concurrency.max(1),
        }
    }

    pub fn platforms(&self) -> &PlatformConfig {
        &self.platforms
    }

    fn acquirer_for(&self, strategy: AcquisitionStrategy) -> &dyn Acquirer {
        match strategy {
            AcquisitionStrategy::Broker => self.broker.as_ref(),
            AcquisitionStrategy::DirectPage => self.direct_page.as_ref(),
            AcquisitionStrategy::OpenGraph => self.opengraph.as_ref(),
        }
    }

    /// Validates, classifies, acquires and persists everything one URL points at.
    #[instrument(skip(self, request, cancel), fields(url = %request.url, user = %request.requesting_user_id))]
    pub async fn import_from_url(
        &self,
        request: &ImportRequest,
        cancel: CancellationToken,
    ) -> Result<ImportOutcome> {
        let deadline = Instant::now() + self.request_deadline;

        enter(ImportState::Validating);
        let url = security::validate(&request.url).map_err(|reason| {
            warn!(reason = %reason, "Rejected unsafe URL");
            let err = ImportError::from(reason);
            ImportMetrics::record_rejected(err.code());
            err
        })?;

        enter(ImportState::Classifying);
        let target = classify(&url, &self.platforms).map_err(|err| {
            info!(host = url.host_str().unwrap_or_default(), "Unsupported platform");
            ImportMetrics::record_rejected(err.code());
            err
        })?;
        ImportMetrics::record_run(target.platform);
        info!(platform = %target.platform, strategy = ?target.strategy, "🚀 Starting import");

        enter(ImportState::Acquiring);
        let mut items = self.acquire(&target, deadline, cancel.clone()).await?;
        if items.is_empty() {
            return Err(ImportError::NoDataFound {
                url: target.url.to_string(),
            });
        }
        if !target.platform.is_batch() && items.len() > 1 {
            debug!(extra = items.len() - 1, "Single-event run returned extra items, keeping the first");
            items.truncate(1);
        }

        let ctx = NormalizeContext {
            platform: target.platform,
            source_url: canonical_source_url(&target.url, target.platform),
        };
        let user = request.requesting_user_id;
        let results: Vec<ItemOutcome> = stream::iter(items)
            .map(|item| self.process_item(item, &ctx, user, &cancel))
            .buffered(self.item_concurrency)
            .collect()
            .await;

        enter(ImportState::Summarizing);
        self.summarize(target.platform, results)
    }

    async fn acquire(
        &self,
        target: &ClassifiedTarget,
        deadline: Instant,
        cancel: CancellationToken,
    ) -> Result<Vec<RawAcquiredItem>> {
        let ctx = AcquireContext::new(cancel, deadline, self.processing_buffer);
        let started = StdInstant::now();
        match self.acquirer_for(target.strategy).acquire(target, &ctx).await {
            Ok(items) => {
                ImportMetrics::record_acquire(
                    target.platform,
                    started.elapsed().as_secs_f64(),
                    items.len(),
                );
                info!(items = items.len(), "✅ Acquired raw items");
                Ok(items)
            }
            Err(err) => {
                warn!(code = err.code(), error = %err, "Acquisition failed");
                ImportMetrics::record_acquire_error(target.platform, err.code());
                Err(err)
            }
        }
    }

    async fn process_item(
        &self,
        item: RawAcquiredItem,
        ctx: &NormalizeContext,
        user: Uuid,
        cancel: &CancellationToken,
    ) -> ItemOutcome {
        if cancel.is_cancelled() {
            return ItemOutcome::Failed(ImportError::Cancelled);
        }

        enter(ImportState::Normalizing);
        let event = match self.registry.normalize(&item, ctx) {
            Ok(event) => event,
            Err(e) if e.is_skip() => {
                debug!(reason = %e, "Skipping item");
                return ItemOutcome::Skipped(format!("Skipped: {e}"));
            }
            Err(e) => {
                debug!(reason = %e, "Item rejected");
                return ItemOutcome::Failed(e.into());
            }
        };
        debug!(
            title = %event.title,
            location = ?event.location_precision(),
            "Normalized item"
        );

        enter(ImportState::Deduplicating);
        match self.dedup.exists(&event.source_url).await {
            Ok(Some(_)) => {
                let dup = ImportError::DuplicateSource {
                    source_url: event.source_url.clone(),
                };
                return ItemOutcome::Skipped(format!("Skipped \"{}\": {dup}", event.title));
            }
            Ok(None) => {}
            Err(e) => return ItemOutcome::Failed(e),
        }

        enter(ImportState::Persisting);
        match self.persister.insert(event, ctx.platform, user).await {
            Ok(PersistOutcome::Created(record)) => ItemOutcome::Imported(ImportedEventRef {
                id: record.id,
                title: record.event.title,
                slug: record.slug,
            }),
            Ok(PersistOutcome::AlreadyExists(record)) => {
                let dup = ImportError::DuplicateSource {
                    source_url: record.event.source_url,
                };
                ItemOutcome::Skipped(format!("Skipped \"{}\": {dup}", record.event.title))
            }
            Err(e) => ItemOutcome::Failed(e),
        }
    }

    fn summarize(&self, platform: Platform, results: Vec<ItemOutcome>) -> Result<ImportOutcome> {
        let mut outcome = ImportOutcome::new(platform);
        let mut last_error = None;

        for result in results {
            match result {
                ItemOutcome::Imported(imported) => {
                    ImportMetrics::record_item(platform, "imported");
                    outcome.processed_count += 1;
                    outcome.details.push(format!("Imported: {}", imported.title));
                    outcome.imported.push(imported);
                }
                ItemOutcome::Skipped(detail) => {
                    ImportMetrics::record_item(platform, "skipped");
                    outcome.skipped_count += 1;
                    outcome.details.push(detail);
                }
                ItemOutcome::Failed(err) => {
                    ImportMetrics::record_item(platform, "failed");
                    outcome.error_count += 1;
                    outcome.details.push(format!("Failed: {err}"));
                    last_error = Some(err);
                }
            }
        }

        info!(
            processed = outcome.processed_count,
            skipped = outcome.skipped_count,
            errors = outcome.error_count,
            "Import finished"
        );

        // A lone event that neither landed nor was skipped fails the request with its own error.
        if !outcome.is_multiple && outcome.processed_count == 0 && outcome.skipped_count == 0 {
            if let Some(err) = last_error {
                return Err(err);
            }
        }
        Ok(outcome)
    }
}
