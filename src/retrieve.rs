//! Retrieval-augmented answer pipeline.
//!
//! Stages: hybrid search → rerank → context assembly → generation. Every
//! stage tolerates upstream provider failure: search errors degrade to an
//! empty result set, rerank errors keep the original ordering, and
//! generation errors fall back to returning the raw context.

use tracing::{error, info};

use crate::config::Config;
use crate::generate::generate_answer;
use crate::models::{QueryResponse, SearchHit, SourceChunk};
use crate::rerank::rerank_hits;
use crate::store::VectorStore;

/// Initial hybrid search breadth.
const SEARCH_LIMIT: usize = 25;

/// Post-rerank results assembled into the generation context.
const TOP_K: usize = 5;

/// Fixed answer when the index has nothing relevant.
pub const NOT_FOUND_MESSAGE: &str =
    "I could not find any relevant information in the indexed ontologies to answer your question.";

/// Execute the full pipeline for one query.
pub async fn answer_query(store: &dyn VectorStore, config: &Config, query: &str) -> QueryResponse {
    info!(query, "performing hybrid search");
    let hits = match store.search_bm25(query, SEARCH_LIMIT).await {
        Ok(hits) => hits,
        Err(err) => {
            error!(error = %err, "hybrid search failed");
            Vec::new()
        }
    };

    if hits.is_empty() {
        return QueryResponse {
            answer: NOT_FOUND_MESSAGE.to_string(),
            sources: Vec::new(),
        };
    }

    info!(results = hits.len(), "re-ranking search results");
    let reranked = rerank_hits(&config.rerank, query, hits).await;

    let top: Vec<SearchHit> = reranked.into_iter().take(TOP_K).collect();

    info!(context_chunks = top.len(), "generating answer");
    let answer = generate_with_fallback(config, query, &top).await;

    QueryResponse {
        answer,
        sources: top.into_iter().map(SourceChunk::from).collect(),
    }
}

async fn generate_with_fallback(config: &Config, query: &str, top: &[SearchHit]) -> String {
    let context: String = top
        .iter()
        .map(|hit| hit.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    if config.generation.is_enabled() {
        match generate_answer(&config.generation, &context, query).await {
            Ok(answer) => return answer,
            Err(err) => {
                tracing::warn!(error = %err, "generation failed, using fallback response");
            }
        }
    }

    format!(
        "Based on the available ontology context, here is the most relevant information:\n\n\
         {context}\n\n\
         This answer is generated without an LLM due to missing credentials."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RerankConfig, StoreConfig};
    use crate::models::ChunkRecord;
    use crate::store::MemoryVectorStore;
    use anyhow::Result;
    use async_trait::async_trait;

    fn test_config() -> Config {
        Config {
            store: StoreConfig {
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

    fn record(id: &str, content: &str) -> ChunkRecord {
        ChunkRecord {
            id: id.to_string(),
            content: content.to_string(),
            ontology_id: "MAT".to_string(),
            version: "1.0".to_string(),
            header: "Classes".to_string(),
            metadata: serde_json::json!({"acronym": "MAT"}),
        }
    }

    /// Store whose search always fails, for degradation tests.
    struct BrokenStore;

    #[async_trait]
    impl VectorStore for BrokenStore {
        async fn ensure_schema(&self) -> Result<()> {
            Ok(())
        }
        async fn upsert_batch(&self, _records: &[ChunkRecord]) -> Result<()> {
            Ok(())
        }
        async fn delete_by_ontology(&self, _ontology_id: &str) -> Result<()> {
            Ok(())
        }
        async fn search_bm25(&self, _query: &str, _limit: usize) -> Result<Vec<SearchHit>> {
            anyhow::bail!("connection refused")
        }
        async fn get_one(&self, _ontology_id: &str) -> Result<Option<SearchHit>> {
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn test_empty_index_returns_not_found() {
        let store = MemoryVectorStore::new();
        let response = answer_query(&store, &test_config(), "what is an alloy?").await;
        assert_eq!(response.answer, NOT_FOUND_MESSAGE);
        assert!(response.sources.is_empty());
    }

    #[tokio::test]
    async fn test_search_failure_degrades_to_not_found() {
        let response = answer_query(&BrokenStore, &test_config(), "anything").await;
        assert_eq!(response.answer, NOT_FOUND_MESSAGE);
        assert!(response.sources.is_empty());
    }

    #[tokio::test]
    async fn test_answer_without_generation_returns_context() {
        let store = MemoryVectorStore::new();
        store
            .upsert_batch(&[record("a", "An alloy is a metallic mixture.")])
            .await
            .unwrap();

        let response = answer_query(&store, &test_config(), "alloy").await;
        assert!(response.answer.contains("An alloy is a metallic mixture."));
        assert!(response
            .answer
            .contains("generated without an LLM"));
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].ontology_id, "MAT");
        assert_eq!(response.sources[0].version, "1.0");
    }

    #[tokio::test]
    async fn test_rerank_failure_still_answers_in_search_order() {
        let store = MemoryVectorStore::new();
        store
            .upsert_batch(&[
                record("a", "alloy of iron and carbon"),
                record("b", "alloy of iron"),
            ])
            .await
            .unwrap();

        let mut config = test_config();
        config.rerank = RerankConfig {
            provider: "cohere".to_string(),
            base_url: Some("http://127.0.0.1:9".to_string()),
            api_key_env: "RETRIEVE_TEST_RERANK_KEY".to_string(),
            ..RerankConfig::default()
        };
        std::env::set_var("RETRIEVE_TEST_RERANK_KEY", "dummy");

        let response = answer_query(&store, &config, "iron carbon").await;
        assert_ne!(response.answer, NOT_FOUND_MESSAGE);
        assert_eq!(response.sources.len(), 2);
        // Original search order preserved.
        assert_eq!(response.sources[0].content, "alloy of iron and carbon");
    }

    #[tokio::test]
    async fn test_top_k_limits_sources() {
        let store = MemoryVectorStore::new();
        let records: Vec<ChunkRecord> = (0..10)
            .map(|i| record(&format!("id-{i}"), &format!("alloy fact number {i}")))
            .collect();
        store.upsert_batch(&records).await.unwrap();

        let response = answer_query(&store, &test_config(), "alloy").await;
        assert_eq!(response.sources.len(), TOP_K);
    }
}
