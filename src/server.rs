//! HTTP search service.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/search` | Body `{"query": "..."}`, returns a JSON array of records |
//! | `GET`  | `/search?query=...` | Same as `POST /search` |
//! | `GET`  | `/records/{id}` | Single record by store id |
//! | `POST` | `/rebuild` | Wipe the index and re-index every store row (`?truncate=true` re-ingests from files instead) |
//! | `GET`  | `/health` | Version and background ingestion status |
//!
//! Search results are eventually consistent with ingestion: while the
//! startup pass runs, queries see a partially built index.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `search_unavailable` (503), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser clients can
//! query the service directly.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::db::Backends;
use crate::error::CatalogError;
use crate::get::get_record;
use crate::ingest::{spawn_background, IngestStatus, Ingestor};
use crate::models::CatalogRecord;
use crate::rebuild::{reindex_from_store, reset_and_ingest};
use crate::search::SearchService;
use crate::store::CatalogStore;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    search: Arc<SearchService>,
    store: Arc<dyn CatalogStore>,
    /// Serializes writers: the background pass and rebuilds.
    ingestor: Arc<Mutex<Ingestor>>,
    status: watch::Receiver<IngestStatus>,
}

impl AppState {
    pub fn new(
        search: Arc<SearchService>,
        store: Arc<dyn CatalogStore>,
        ingestor: Arc<Mutex<Ingestor>>,
        status: watch::Receiver<IngestStatus>,
    ) -> Self {
        Self {
            search,
            store,
            ingestor,
            status,
        }
    }
}

/// Build the router with all routes and the CORS layer.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/search", post(handle_search).get(handle_search_get))
        .route("/records/{id}", get(handle_get_record))
        .route("/rebuild", post(handle_rebuild))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server.
///
/// Opens the store and index, spawns the startup ingestion pass when
/// `[ingest].on_startup` is set, and serves until the process is terminated.
/// Queries are accepted immediately, without waiting for the pass.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.bind_addr();
    let backends = Backends::open(config).await?;
    let store: Arc<dyn CatalogStore> = backends.store.clone();

    let ingestor = Ingestor::new(store.clone(), backends.index.clone(), config).await?;
    let ingestor = Arc::new(Mutex::new(ingestor));

    let status = if config.ingest.on_startup {
        let (status, _handle) = spawn_background(ingestor.clone());
        status
    } else {
        let (_tx, status) = watch::channel(IngestStatus::Idle);
        status
    };

    let search = Arc::new(SearchService::new(
        store.clone(),
        backends.index.clone(),
        &config.search,
    ));
    let app = router(AppState::new(search, store, ingestor, status));

    println!("Catalog search listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// Maps library errors to HTTP statuses. Client mistakes are 4xx, an
/// unreachable index is 503, everything else is 500.
impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        let message = err.to_string();
        let (status, code) = match &err {
            CatalogError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            CatalogError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            CatalogError::SearchUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "search_unavailable")
            }
            _ => {
                error!(error = %message, code = err.code(), "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        AppError {
            status,
            code: code.to_string(),
            message,
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    ingestion: IngestStatus,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ingestion: state.status.borrow().clone(),
    })
}

// ============ /search ============

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

async fn handle_search(
    State(state): State<AppState>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<Vec<CatalogRecord>>, AppError> {
    let Json(req) = body.map_err(|e| bad_request(e.body_text()))?;
    let records = state.search.search(&req.query).await?;
    Ok(Json(records))
}

async fn handle_search_get(
    State(state): State<AppState>,
    params: Result<Query<SearchRequest>, QueryRejection>,
) -> Result<Json<Vec<CatalogRecord>>, AppError> {
    let Query(req) = params.map_err(|e| bad_request(e.body_text()))?;
    let records = state.search.search(&req.query).await?;
    Ok(Json(records))
}

// ============ GET /records/{id} ============

async fn handle_get_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CatalogRecord>, AppError> {
    let id: i64 = id
        .parse()
        .map_err(|_| bad_request(format!("invalid record id: {}", id)))?;
    let record = get_record(state.store.as_ref(), id).await?;
    Ok(Json(record))
}

// ============ POST /rebuild ============

#[derive(Debug, Default, Deserialize)]
struct RebuildParams {
    #[serde(default)]
    truncate: bool,
}

async fn handle_rebuild(
    State(state): State<AppState>,
    params: Result<Query<RebuildParams>, QueryRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Query(params) = params.map_err(|e| bad_request(e.body_text()))?;
    let mut ingestor = state.ingestor.lock().await;

    if params.truncate {
        let report = reset_and_ingest(&mut ingestor).await?;
        info!(files = report.ingest.files_ingested, "Rebuilt from input files");
        return Ok(Json(serde_json::json!({ "result": report })));
    }

    let report = reindex_from_store(
        ingestor.store().as_ref(),
        ingestor.index().clone(),
        ingestor.batch_size(),
    )
    .await?;
    info!(indexed = report.documents_indexed, "Rebuilt index from store");
    Ok(Json(serde_json::json!({ "result": report })))
}
