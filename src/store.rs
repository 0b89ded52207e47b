//! Vector store abstraction.
//!
//! The [`VectorStore`] trait defines the storage operations the ingestion
//! and retrieval pipelines need, keeping the wire protocol behind a seam:
//! an HTTP implementation speaking a Weaviate-style REST/GraphQL API, and
//! an in-memory implementation for tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::models::{ChunkRecord, SearchHit};

/// Abstract upsert/query/delete capability over the persisted chunks.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the chunk class/schema if it does not exist. Idempotent.
    async fn ensure_schema(&self) -> Result<()>;

    /// Insert or replace records by their explicit ids.
    async fn upsert_batch(&self, records: &[ChunkRecord]) -> Result<()>;

    /// Delete all records whose ontology identifier equals `ontology_id`.
    async fn delete_by_ontology(&self, ontology_id: &str) -> Result<()>;

    /// Keyword (BM25-style) search over chunk content.
    async fn search_bm25(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;

    /// Fetch one record for an ontology identifier, if any is indexed.
    async fn get_one(&self, ontology_id: &str) -> Result<Option<SearchHit>>;
}

// ============ HTTP vector store ============

/// Client for a Weaviate-style vector store REST/GraphQL API.
///
/// Chunk metadata is persisted as a JSON text property and parsed back on
/// read. The API key, when present in the configured environment
/// variable, is sent as a bearer token.
pub struct HttpVectorStore {
    client: reqwest::Client,
    base_url: String,
    class_name: String,
}

impl HttpVectorStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Ok(key) = std::env::var(&config.api_key_env) {
            if !key.is_empty() {
                let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {key}"))
                    .context("store API key is not a valid header value")?;
                headers.insert(reqwest::header::AUTHORIZATION, value);
            }
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            class_name: config.class_name.clone(),
        })
    }

    fn record_fields() -> &'static str {
        "content ontology_id version header metadata"
    }

    async fn graphql(&self, query: String) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(format!("{}/v1/graphql", self.base_url))
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("vector store query failed with {status}: {body}");
        }
        Ok(response.json().await?)
    }

    fn hits_from_response(&self, payload: &serde_json::Value) -> Vec<SearchHit> {
        payload
            .pointer(&format!("/data/Get/{}", self.class_name))
            .and_then(|v| v.as_array())
            .map(|items| items.iter().map(hit_from_object).collect())
            .unwrap_or_default()
    }
}

fn hit_from_object(obj: &serde_json::Value) -> SearchHit {
    let text = |key: &str| {
        obj.get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };
    let metadata = obj
        .get("metadata")
        .and_then(|v| v.as_str())
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or(serde_json::Value::Null);

    SearchHit {
        content: text("content"),
        ontology_id: text("ontology_id"),
        version: text("version"),
        metadata,
    }
}

/// Escape a user string for embedding into a GraphQL query literal.
fn graphql_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

#[async_trait]
impl VectorStore for HttpVectorStore {
    async fn ensure_schema(&self) -> Result<()> {
        let url = format!("{}/v1/schema/{}", self.base_url, self.class_name);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("vector store unreachable")?;

        if response.status().is_success() {
            debug!(class = %self.class_name, "schema already exists");
            return Ok(());
        }
        if response.status() != reqwest::StatusCode::NOT_FOUND {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("schema lookup failed with {status}: {body}");
        }

        let schema = serde_json::json!({
            "class": self.class_name,
            "description": "Chunks of ontology documentation.",
            "vectorizer": "none",
            "properties": [
                {"name": "content", "dataType": ["text"]},
                {"name": "ontology_id", "dataType": ["text"]},
                {"name": "version", "dataType": ["text"]},
                {"name": "header", "dataType": ["text"]},
                {"name": "metadata", "dataType": ["text"]}
            ]
        });

        let response = self
            .client
            .post(format!("{}/v1/schema", self.base_url))
            .json(&schema)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("schema creation failed with {status}: {body}");
        }
        info!(class = %self.class_name, "created vector store schema");
        Ok(())
    }

    async fn upsert_batch(&self, records: &[ChunkRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let objects: Vec<serde_json::Value> = records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "class": self.class_name,
                    "id": r.id,
                    "properties": {
                        "content": r.content,
                        "ontology_id": r.ontology_id,
                        "version": r.version,
                        "header": r.header,
                        "metadata": r.metadata.to_string(),
                    }
                })
            })
            .collect();

        let response = self
            .client
            .post(format!("{}/v1/batch/objects", self.base_url))
            .json(&serde_json::json!({ "objects": objects }))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("batch upsert failed with {status}: {body}");
        }
        Ok(())
    }

    async fn delete_by_ontology(&self, ontology_id: &str) -> Result<()> {
        let body = serde_json::json!({
            "match": {
                "class": self.class_name,
                "where": {
                    "path": ["ontology_id"],
                    "operator": "Equal",
                    "valueText": ontology_id,
                }
            }
        });

        let response = self
            .client
            .delete(format!("{}/v1/batch/objects", self.base_url))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            bail!("batch delete failed with {status}: {text}");
        }
        info!(ontology_id, "deleted existing indexed chunks");
        Ok(())
    }

    async fn search_bm25(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let gql = format!(
            "{{ Get {{ {class}(bm25: {{query: {query}}}, limit: {limit}) {{ {fields} }} }} }}",
            class = self.class_name,
            query = graphql_string(query),
            fields = Self::record_fields(),
        );
        let payload = self.graphql(gql).await?;
        Ok(self.hits_from_response(&payload))
    }

    async fn get_one(&self, ontology_id: &str) -> Result<Option<SearchHit>> {
        let gql = format!(
            "{{ Get {{ {class}(where: {{path: [\"ontology_id\"], operator: Equal, valueText: {value}}}, limit: 1) {{ {fields} }} }} }}",
            class = self.class_name,
            value = graphql_string(ontology_id),
            fields = Self::record_fields(),
        );
        let payload = self.graphql(gql).await?;
        Ok(self.hits_from_response(&payload).into_iter().next())
    }
}

// ============ In-memory vector store ============

/// In-memory [`VectorStore`] for tests.
///
/// Keyword search is a term-match count stand-in for BM25 ranking.
#[derive(Default)]
pub struct MemoryVectorStore {
    records: RwLock<HashMap<String, ChunkRecord>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_count(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn records_for(&self, ontology_id: &str) -> Vec<ChunkRecord> {
        self.records
            .read()
            .unwrap()
            .values()
            .filter(|r| r.ontology_id == ontology_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert_batch(&self, records: &[ChunkRecord]) -> Result<()> {
        let mut stored = self.records.write().unwrap();
        for record in records {
            stored.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn delete_by_ontology(&self, ontology_id: &str) -> Result<()> {
        let mut stored = self.records.write().unwrap();
        stored.retain(|_, r| r.ontology_id != ontology_id);
        Ok(())
    }

    async fn search_bm25(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let query_lower = query.to_lowercase();
        let terms: Vec<&str> = query_lower.split_whitespace().collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let stored = self.records.read().unwrap();
        let mut scored: Vec<(usize, SearchHit)> = stored
            .values()
            .filter_map(|r| {
                let text_lower = r.content.to_lowercase();
                let matches = terms.iter().filter(|t| text_lower.contains(*t)).count();
                if matches > 0 {
                    Some((
                        matches,
                        SearchHit {
                            content: r.content.clone(),
                            ontology_id: r.ontology_id.clone(),
                            version: r.version.clone(),
                            metadata: r.metadata.clone(),
                        },
                    ))
                } else {
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.content.cmp(&b.1.content)));
        scored.truncate(limit);
        Ok(scored.into_iter().map(|(_, hit)| hit).collect())
    }

    async fn get_one(&self, ontology_id: &str) -> Result<Option<SearchHit>> {
        let stored = self.records.read().unwrap();
        Ok(stored
            .values()
            .find(|r| r.ontology_id == ontology_id)
            .map(|r| SearchHit {
                content: r.content.clone(),
                ontology_id: r.ontology_id.clone(),
                version: r.version.clone(),
                metadata: r.metadata.clone(),
            }))
    }
}
