//! Ingestion unit of work.
//!
//! One ingestion takes raw ontology bytes through sanitation, parsing,
//! document conversion, chunking, and indexing. Each run works in its own
//! scratch directory (removed on drop) and shares no in-process state
//! with concurrent ingestions; all sharing happens through the store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::SanitizeConfig;
use crate::index::index_graph;
use crate::parse::{load_graph_with_fallbacks, ParseFailure};
use crate::sanitize::Sanitizer;
use crate::store::VectorStore;
use crate::tasks::TaskRegistry;

/// Everything one ingestion run needs, independent of transport.
#[derive(Debug, Clone)]
pub struct IngestJob {
    pub file_bytes: Vec<u8>,
    pub filename: String,
    pub ontology_id: String,
    pub version: String,
    pub is_update: bool,
    pub metadata: serde_json::Value,
}

/// Process and index one ontology file. Returns the chunk count.
///
/// Update-mode runs delete all previously indexed chunks for the
/// ontology identifier before inserting fresh ones (replace-on-update).
pub async fn run_ingestion(
    store: &dyn VectorStore,
    sanitize_config: &SanitizeConfig,
    job: &IngestJob,
    task_id: &str,
) -> Result<usize> {
    info!(
        ontology_id = %job.ontology_id,
        version = %job.version,
        is_update = job.is_update,
        task_id,
        "starting ontology ingestion"
    );

    let scratch = tempfile::Builder::new().prefix("ontology-ingest-").tempdir()?;
    let filename = if job.filename.is_empty() {
        "ontology.owl".to_string()
    } else {
        job.filename.clone()
    };
    let input_path = scratch.path().join(filename);
    std::fs::write(&input_path, &job.file_bytes)
        .with_context(|| format!("failed to stage upload at {}", input_path.display()))?;

    store.ensure_schema().await?;

    if job.is_update {
        store.delete_by_ontology(&job.ontology_id).await?;
    }

    let sanitizer = Sanitizer::new(sanitize_config)?;
    let candidates = sanitizer.sanitize(&input_path)?;
    let graph = load_graph_with_fallbacks(&candidates)?;
    info!(triples = graph.len(), "loaded ontology graph");

    let count = index_graph(
        store,
        &graph,
        &job.ontology_id,
        &job.version,
        &job.metadata,
        task_id,
    )
    .await?;

    info!(ontology_id = %job.ontology_id, chunks = count, "ingestion complete");
    Ok(count)
}

/// Short classification of an ingestion error for task status reporting.
pub fn error_kind(err: &anyhow::Error) -> &'static str {
    if err.downcast_ref::<ParseFailure>().is_some() {
        "ParseFailure"
    } else {
        "IngestionError"
    }
}

// ============ Dispatch seam ============

/// Dispatches one ingestion as an asynchronous unit of work and returns
/// its tracking identifier immediately.
#[async_trait]
pub trait IngestDispatcher: Send + Sync {
    async fn dispatch(&self, job: IngestJob) -> Result<String>;
}

/// Dispatcher backed by `tokio::spawn` and the in-memory task registry.
pub struct SpawnDispatcher {
    pub store: Arc<dyn VectorStore>,
    pub sanitize: SanitizeConfig,
    pub tasks: Arc<TaskRegistry>,
}

#[async_trait]
impl IngestDispatcher for SpawnDispatcher {
    async fn dispatch(&self, job: IngestJob) -> Result<String> {
        let task_id = Uuid::new_v4().to_string();
        self.tasks.start(&task_id);

        let store = self.store.clone();
        let sanitize = self.sanitize.clone();
        let tasks = self.tasks.clone();
        let spawned_task_id = task_id.clone();

        tokio::spawn(async move {
            match run_ingestion(store.as_ref(), &sanitize, &job, &spawned_task_id).await {
                Ok(count) => tasks.succeed(&spawned_task_id, count),
                Err(err) => {
                    error!(
                        ontology_id = %job.ontology_id,
                        task_id = %spawned_task_id,
                        error = %err,
                        "ingestion task failed"
                    );
                    tasks.fail(&spawned_task_id, error_kind(&err), &err.to_string());
                }
            }
        });

        Ok(task_id)
    }
}

/// Dispatcher that runs the ingestion to completion before returning.
///
/// Used by one-shot CLI commands, where exiting before a spawned task
/// finishes would lose the work.
pub struct InlineDispatcher {
    pub store: Arc<dyn VectorStore>,
    pub sanitize: SanitizeConfig,
}

#[async_trait]
impl IngestDispatcher for InlineDispatcher {
    async fn dispatch(&self, job: IngestJob) -> Result<String> {
        let task_id = Uuid::new_v4().to_string();
        run_ingestion(self.store.as_ref(), &self.sanitize, &job, &task_id).await?;
        Ok(task_id)
    }
}
