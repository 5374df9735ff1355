use anyhow::Context;
use clap::{Parser, Subcommand};
use event_importer::config::ImporterConfig;
use event_importer::infra::ReqwestHttp;
use event_importer::pipeline::ImportOrchestrator;
use event_importer::server::{create_router, outcome_response, start_server, AppState};
use event_importer::storage::{EventStore, InMemoryEventStore};
use event_importer::types::ImportRequest;
use event_importer::{logging, metrics};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "event_importer")]
#[command(about = "Imports third-party event listings into the canonical event store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP import API
    Serve {
        /// Port to listen on (overrides config and IMPORTER_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Import a single URL and print the outcome as JSON
    Import {
        /// Event or search-results URL
        url: String,
        /// Id of the user the import is recorded for
        #[arg(long)]
        user: Uuid,
    },
}

async fn build_store(config: &ImporterConfig) -> anyhow::Result<Arc<dyn EventStore>> {
    #[cfg(feature = "db")]
    {
        if config.storage.libsql_url.is_some() || config.storage.db_path.is_some() {
            let store = event_importer::storage::LibsqlEventStore::connect(&config.storage)
                .await
                .context("failed to open event database")?;
            return Ok(Arc::new(store));
        }
    }
    #[cfg(not(feature = "db"))]
    {
        if config.storage.libsql_url.is_some() || config.storage.db_path.is_some() {
            warn!("Database settings found but the `db` feature is disabled; using in-memory storage");
        }
    }
    warn!("Using in-memory event storage; imported events are lost on exit");
    Ok(Arc::new(InMemoryEventStore::new()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();
    metrics::init_metrics();

    let cli = Cli::parse();
    let config = ImporterConfig::load().context("failed to load configuration")?;

    let http = Arc::new(
        ReqwestHttp::new(config.fetch.max_page_bytes)
            .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))?,
    );
    let store = build_store(&config).await?;
    let orchestrator = Arc::new(ImportOrchestrator::from_config(&config, http, store));

    match cli.command {
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.server.port);
            info!(
                opengraph_hosts = ?orchestrator.platforms().opengraph_hosts(),
                "Starting import API"
            );
            let router = create_router(AppState { orchestrator }, config.request_deadline());
            start_server(router, port).await?;
        }
        Commands::Import { url, user } => {
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            let request = ImportRequest::new(url, user);
            match orchestrator.import_from_url(&request, cancel).await {
                Ok(outcome) => {
                    println!("{}", serde_json::to_string_pretty(&outcome)?);
                    let (status, _) = outcome_response(outcome);
                    if !status.is_success() {
                        anyhow::bail!("nothing new was imported");
                    }
                }
                Err(e) => {
                    error!(code = e.code(), "Import failed: {}", e);
                    anyhow::bail!("import failed: {e}");
                }
            }
        }
    }

    Ok(())
}
