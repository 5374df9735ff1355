use crate::constants::USER_ID_HEADER;
use crate::error::ImportError;
use crate::pipeline::ImportOrchestrator;
use crate::types::{ImportOutcome, ImportRequest};
use axum::{
    extract::rejection::JsonRejection,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Extension, Router,
};
use hyper::Server;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ImportOrchestrator>,
}

#[derive(Debug, Deserialize)]
pub struct ImportBody {
    pub url: String,
}

/// Body of every import response.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_multiple: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ImportResponse {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn error_response(err: &ImportError) -> (StatusCode, Json<ImportResponse>) {
    (status(err.status_code()), Json(ImportResponse::failure(err.to_string())))
}

/// Maps a finished run to the HTTP answer.
pub fn outcome_response(outcome: ImportOutcome) -> (StatusCode, Json<ImportResponse>) {
    let details = (!outcome.details.is_empty()).then(|| outcome.details.clone());

    if outcome.is_multiple {
        let count = outcome.processed_count;
        let mut body = ImportResponse {
            success: count > 0,
            count: Some(count),
            is_multiple: Some(true),
            details,
            ..Default::default()
        };
        if count == 0 {
            body.error = Some(format!(
                "No new events imported ({} skipped, {} failed)",
                outcome.skipped_count, outcome.error_count
            ));
            return (StatusCode::CONFLICT, Json(body));
        }
        return (StatusCode::OK, Json(body));
    }

    match outcome.imported.into_iter().next() {
        Some(imported) => (
            StatusCode::OK,
            Json(ImportResponse {
                success: true,
                title: Some(imported.title),
                slug: Some(imported.slug),
                ..Default::default()
            }),
        ),
        None => {
            let error = outcome
                .details
                .first()
                .cloned()
                .unwrap_or_else(|| "Event was not imported".to_string());
            (
                StatusCode::CONFLICT,
                Json(ImportResponse {
                    error: Some(error),
                    details,
                    ..Default::default()
                }),
            )
        }
    }
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "event-importer",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn import_event(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    body: Result<Json<ImportBody>, JsonRejection>,
) -> (StatusCode, Json<ImportResponse>) {
    let user = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok());
    let Some(user) = user else {
        return error_response(&ImportError::Unauthenticated);
    };

    let url = match body {
        Ok(Json(body)) if !body.url.trim().is_empty() => body.url,
        Ok(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ImportResponse::failure("URL is required")),
            )
        }
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ImportResponse::failure(format!("Invalid request body: {rejection}"))),
            )
        }
    };

    // Cancels in-flight work if the client goes away and this future is dropped.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let request = ImportRequest::new(url, user);
    match state.orchestrator.import_from_url(&request, cancel).await {
        Ok(outcome) => outcome_response(outcome),
        Err(err) => {
            warn!(code = err.code(), "Import failed: {}", err);
            error_response(&err)
        }
    }
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState, request_deadline: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/events/import", post(import_event))
        .layer(Extension(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(TimeoutLayer::new(request_deadline)),
        )
}

/// Start the HTTP server on the specified port
pub async fn start_server(router: Router, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("🚀 HTTP server running on http://localhost:{port}");
    info!("💚 Health check: http://localhost:{port}/health");
    info!("📥 Import:       POST http://localhost:{port}/api/events/import");

    Server::bind(&addr).serve(router.into_make_service()).await?;

    Ok(())
}
