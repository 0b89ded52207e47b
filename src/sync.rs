//! Periodic catalog synchronisation.
//!
//! One cycle lists the catalog's latest submissions, compares each
//! version against what the index currently holds, and dispatches an
//! ingestion only on mismatch: not yet indexed is an insert, indexed at
//! an older version is an update. Failures never abort the cycle loop;
//! a cycle degrades to a skipped or error report.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::catalog::CatalogClient;
use crate::config::Config;
use crate::ingest::{IngestDispatcher, IngestJob};
use crate::models::OntologyRecord;
use crate::store::VectorStore;

/// Outcome of one synchronisation cycle.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub queued: usize,
}

impl SyncReport {
    fn skipped(reason: &str) -> Self {
        Self {
            status: "skipped".to_string(),
            reason: Some(reason.to_string()),
            queued: 0,
        }
    }

    fn failed(reason: &str) -> Self {
        Self {
            status: "error".to_string(),
            reason: Some(reason.to_string()),
            queued: 0,
        }
    }

    fn ok(queued: usize) -> Self {
        Self {
            status: "ok".to_string(),
            reason: None,
            queued,
        }
    }
}

/// Execute one full synchronisation cycle.
pub async fn run_sync_cycle(
    config: &Config,
    store: &dyn VectorStore,
    catalog: &CatalogClient,
    dispatcher: &dyn IngestDispatcher,
) -> SyncReport {
    if !config.sync.enabled {
        info!("ontology sync disabled via configuration; skipping cycle");
        return SyncReport::skipped("disabled");
    }
    if !catalog.has_api_key() {
        warn!("catalog API key is not configured; skipping ontology sync");
        return SyncReport::skipped("missing_api_key");
    }

    let ontologies = match catalog.list_latest_submissions().await {
        Ok(records) => records,
        Err(err) => {
            error!(error = %err, "failed to fetch catalog ontologies");
            return SyncReport::failed("fetch_failed");
        }
    };
    if ontologies.is_empty() {
        info!("no ontologies returned from catalog");
        return SyncReport::ok(0);
    }

    if let Err(err) = store.ensure_schema().await {
        error!(error = %err, "vector store unavailable during sync");
        return SyncReport::failed("store_unavailable");
    }

    let mut queued = 0usize;
    for ontology in &ontologies {
        match process_ontology(store, catalog, dispatcher, ontology).await {
            Ok(Some(task_id)) => {
                info!(
                    acronym = %ontology.acronym,
                    version = %ontology.version,
                    task_id = %task_id,
                    "queued ingestion task"
                );
                queued += 1;
            }
            Ok(None) => {}
            Err(err) => {
                error!(
                    acronym = %ontology.acronym,
                    error = %err,
                    "failed to queue ingestion for ontology"
                );
            }
        }
    }

    info!(queued, "ontology sync completed");
    SyncReport::ok(queued)
}

/// Dispatch ingestion for one catalog record if its version differs from
/// the currently indexed one. Returns the task id when dispatched.
async fn process_ontology(
    store: &dyn VectorStore,
    catalog: &CatalogClient,
    dispatcher: &dyn IngestDispatcher,
    ontology: &OntologyRecord,
) -> Result<Option<String>> {
    let existing_version = current_indexed_version(store, &ontology.acronym).await;
    let Some(is_update) = ingest_action(existing_version.as_deref(), &ontology.version) else {
        debug!(
            acronym = %ontology.acronym,
            version = %ontology.version,
            "ontology already at latest version"
        );
        return Ok(None);
    };

    let payload = catalog.download(&ontology.download_url).await?;

    let metadata = serde_json::json!({
        "name": ontology.name,
        "acronym": ontology.acronym,
        "submission_id": ontology.submission_id,
        "source": ontology.download_url,
    });

    let task_id = dispatcher
        .dispatch(IngestJob {
            file_bytes: payload,
            filename: format!("{}.owl", ontology.acronym),
            ontology_id: ontology.acronym.clone(),
            version: ontology.version.clone(),
            is_update,
            metadata,
        })
        .await?;

    Ok(Some(task_id))
}

/// Decide what one catalog record needs: `None` to skip (already at the
/// latest version), `Some(is_update)` to dispatch an ingestion.
fn ingest_action(existing_version: Option<&str>, catalog_version: &str) -> Option<bool> {
    match existing_version {
        Some(v) if v == catalog_version => None,
        Some(_) => Some(true),
        None => Some(false),
    }
}

/// The version currently indexed for an ontology identifier, if any.
async fn current_indexed_version(store: &dyn VectorStore, ontology_id: &str) -> Option<String> {
    match store.get_one(ontology_id).await {
        Ok(hit) => hit.map(|h| h.version),
        Err(err) => {
            error!(ontology_id, error = %err, "failed to query indexed version");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkRecord;
    use crate::store::MemoryVectorStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records dispatched jobs instead of running them.
    #[derive(Default)]
    struct RecordingDispatcher {
        jobs: Mutex<Vec<IngestJob>>,
    }

    #[async_trait]
    impl IngestDispatcher for RecordingDispatcher {
        async fn dispatch(&self, job: IngestJob) -> Result<String> {
            self.jobs.lock().unwrap().push(job);
            Ok("task-test".to_string())
        }
    }

    fn record(ontology: &str, version: &str) -> ChunkRecord {
        ChunkRecord {
            id: format!("{ontology}-{version}"),
            content: "content".to_string(),
            ontology_id: ontology.to_string(),
            version: version.to_string(),
            header: String::new(),
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_ingest_action() {
        // Already at the latest version: skip.
        assert_eq!(ingest_action(Some("1.0"), "1.0"), None);
        // Indexed at an older version: update.
        assert_eq!(ingest_action(Some("1.0"), "2.0"), Some(true));
        // Not yet indexed: insert.
        assert_eq!(ingest_action(None, "1.0"), Some(false));
    }

    #[tokio::test]
    async fn test_indexed_version_lookup() {
        let store = MemoryVectorStore::new();
        store.upsert_batch(&[record("MAT", "1.0")]).await.unwrap();

        assert_eq!(
            current_indexed_version(&store, "MAT").await.as_deref(),
            Some("1.0")
        );
        assert!(current_indexed_version(&store, "NEW").await.is_none());
    }

    #[tokio::test]
    async fn test_disabled_sync_skips() {
        let config = disabled_config();
        let store = MemoryVectorStore::new();
        let catalog = CatalogClient::new(&config.catalog).unwrap();
        let dispatcher = RecordingDispatcher::default();

        let report = run_sync_cycle(&config, &store, &catalog, &dispatcher).await;
        assert_eq!(report.status, "skipped");
        assert_eq!(report.reason.as_deref(), Some("disabled"));
        assert!(dispatcher.jobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_api_key_skips() {
        let mut config = disabled_config();
        config.sync.enabled = true;
        config.catalog.api_key_env = "SYNC_TEST_MISSING_KEY".to_string();
        std::env::remove_var("SYNC_TEST_MISSING_KEY");

        let store = MemoryVectorStore::new();
        let catalog = CatalogClient::new(&config.catalog).unwrap();
        let dispatcher = RecordingDispatcher::default();

        let report = run_sync_cycle(&config, &store, &catalog, &dispatcher).await;
        assert_eq!(report.status, "skipped");
        assert_eq!(report.reason.as_deref(), Some("missing_api_key"));
    }

    fn disabled_config() -> Config {
        Config {
            store: crate::config::StoreConfig {
                url: "http://localhost:8080".to_string(),
                class_name: "OntologyChunk".to_string(),
                api_key_env: "STORE_API_KEY".to_string(),
            },
            catalog: Default::default(),
            rerank: Default::default(),
            generation: Default::default(),
            sanitize: Default::default(),
            sync: Default::default(),
            server: crate::config::ServerConfig {
                bind: "127.0.0.1:0".to_string(),
            },
        }
    }
}
