//! HTTP API server.
//!
//! Exposes the ingestion and query pipelines as a JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ingest` | Dispatch one ingestion task, returns 202 + task id |
//! | `POST` | `/query` | Answer a natural-language question synchronously |
//! | `GET`  | `/tasks/{id}` | Poll the status of a dispatched ingestion |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//! A vector store that is unreachable at startup aborts `serve` before
//! binding, so callers see a service-unavailable condition immediately
//! rather than a stream of failing background tasks.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::catalog::CatalogClient;
use crate::config::Config;
use crate::ingest::{IngestDispatcher, IngestJob, SpawnDispatcher};
use crate::models::{IngestRequest, IngestResponse, QueryRequest, QueryResponse};
use crate::retrieve::answer_query;
use crate::store::{HttpVectorStore, VectorStore};
use crate::sync::run_sync_cycle;
use crate::tasks::{TaskEntry, TaskRegistry};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<dyn VectorStore>,
    tasks: Arc<TaskRegistry>,
    dispatcher: Arc<SpawnDispatcher>,
}

/// Start the HTTP server.
///
/// Verifies the vector store schema before binding; an unreachable store
/// is a startup failure, not a background-task failure. When periodic
/// sync is enabled, a background loop runs one cycle per configured
/// interval.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let config = Arc::new(config.clone());

    let store: Arc<dyn VectorStore> = Arc::new(HttpVectorStore::new(&config.store)?);
    store.ensure_schema().await?;

    let tasks = Arc::new(TaskRegistry::new());
    let dispatcher = Arc::new(SpawnDispatcher {
        store: store.clone(),
        sanitize: config.sanitize.clone(),
        tasks: tasks.clone(),
    });

    if config.sync.enabled {
        spawn_sync_loop(config.clone(), store.clone(), dispatcher.clone())?;
    }

    let state = AppState {
        config: config.clone(),
        store,
        tasks,
        dispatcher,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ingest", post(handle_ingest))
        .route("/query", post(handle_query))
        .route("/tasks/{id}", get(handle_task_status))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("API server listening on http://{}", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn spawn_sync_loop(
    config: Arc<Config>,
    store: Arc<dyn VectorStore>,
    dispatcher: Arc<SpawnDispatcher>,
) -> anyhow::Result<()> {
    let catalog = CatalogClient::new(&config.catalog)?;
    let interval_minutes = config.sync.interval_minutes;
    info!(interval_minutes, "starting periodic ontology sync loop");

    tokio::spawn(async move {
        let period = std::time::Duration::from_secs(interval_minutes * 60);
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let report =
                run_sync_cycle(&config, store.as_ref(), &catalog, dispatcher.as_ref()).await;
            info!(status = %report.status, queued = report.queued, "sync cycle finished");
        }
    });

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

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

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ingest ============

/// Accepts a base64 file payload plus ontology coordinates, dispatches
/// one asynchronous ingestion, and returns its tracking id immediately.
async fn handle_ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<(StatusCode, Json<IngestResponse>), AppError> {
    if request.ontology_id.trim().is_empty() {
        return Err(bad_request("ontology_id must not be empty"));
    }
    if request.version.trim().is_empty() {
        return Err(bad_request("version must not be empty"));
    }

    let file_bytes = STANDARD
        .decode(request.file_b64.as_bytes())
        .map_err(|e| bad_request(format!("file_b64 is not valid base64: {e}")))?;

    let job = IngestJob {
        file_bytes,
        filename: request.filename.unwrap_or_default(),
        ontology_id: request.ontology_id,
        version: request.version,
        is_update: request.is_update,
        metadata: request.metadata,
    };

    let task_id = state.dispatcher.dispatch(job).await.map_err(|e| {
        error!(error = %e, "failed to dispatch ingestion task");
        internal(e.to_string())
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            task_id,
            status: "processing".to_string(),
            message: "Ontology ingestion started.".to_string(),
        }),
    ))
}

// ============ POST /query ============

async fn handle_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    if request.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let response = answer_query(state.store.as_ref(), &state.config, &request.query).await;
    Ok(Json(response))
}

// ============ GET /tasks/{id} ============

async fn handle_task_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskEntry>, AppError> {
    state
        .tasks
        .get(&id)
        .map(Json)
        .ok_or_else(|| not_found(format!("no task with id: {id}")))
}
