//! Core data models used throughout Ontology Harness.
//!
//! These types represent the catalog records, document chunks, persisted
//! index objects, and query responses that flow through the ingestion and
//! retrieval pipelines.

use serde::{Deserialize, Serialize};

/// An ontology and its latest submission, as reported by the catalog.
///
/// Immutable snapshot used only to decide whether re-ingestion is needed.
#[derive(Debug, Clone)]
pub struct OntologyRecord {
    pub acronym: String,
    pub name: String,
    pub submission_id: i64,
    pub version: String,
    pub download_url: String,
    pub ontology_iri: Option<String>,
}

/// Heading text inherited by a chunk at each of the three split levels.
///
/// A level is `None` when no heading of that depth precedes the chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderContext {
    pub h1: Option<String>,
    pub h2: Option<String>,
    pub h3: Option<String>,
}

impl HeaderContext {
    /// The first non-empty heading, preferring the shallowest level.
    pub fn primary(&self) -> &str {
        self.h1
            .as_deref()
            .filter(|h| !h.is_empty())
            .or_else(|| self.h2.as_deref().filter(|h| !h.is_empty()))
            .or_else(|| self.h3.as_deref().filter(|h| !h.is_empty()))
            .unwrap_or("")
    }

    /// Key/value pairs in `("Header 1", text)` form, shallowest first.
    pub fn pairs(&self) -> Vec<(String, String)> {
        [
            ("Header 1", &self.h1),
            ("Header 2", &self.h2),
            ("Header 3", &self.h3),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| (k.to_string(), v.clone())))
        .collect()
    }
}

/// A heading-scoped fragment of a converted ontology document.
///
/// Chunks are totally ordered by document position with contiguous
/// indices starting at 0; no two chunks from one run overlap.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub chunk_index: i64,
    pub text: String,
    pub headers: HeaderContext,
}

/// The persisted unit in the vector store.
///
/// `id` is a deterministic function of `(task_id, chunk_index)`, so
/// re-running ingestion under the same task identifier upserts in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub content: String,
    pub ontology_id: String,
    pub version: String,
    pub header: String,
    pub metadata: serde_json::Value,
}

/// A ranked hit returned by the store's keyword search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub content: String,
    pub ontology_id: String,
    pub version: String,
    pub metadata: serde_json::Value,
}

// ============ External request/response schemas ============

/// Request body for `POST /ingest`.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    /// Base64-encoded ontology file payload.
    pub file_b64: String,
    pub filename: Option<String>,
    pub ontology_id: String,
    pub version: String,
    #[serde(default)]
    pub is_update: bool,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Response body for `POST /ingest`, confirming the dispatched task.
#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub task_id: String,
    pub status: String,
    pub message: String,
}

/// Request body for `POST /query`.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// One source chunk that contributed to a generated answer.
#[derive(Debug, Clone, Serialize)]
pub struct SourceChunk {
    pub ontology_id: String,
    pub version: String,
    pub content: String,
    pub metadata: serde_json::Value,
}

/// Response body for `POST /query`.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<SourceChunk>,
}

impl From<SearchHit> for SourceChunk {
    fn from(hit: SearchHit) -> Self {
        SourceChunk {
            ontology_id: hit.ontology_id,
            version: hit.version,
            content: hit.content,
            metadata: hit.metadata,
        }
    }
}
