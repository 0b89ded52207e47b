//! Rerank provider abstraction.
//!
//! A second-pass relevance reordering of the initial search results using
//! a dedicated scoring provider. Reranking is strictly optional: when the
//! provider is disabled, unreachable, or returns an error, callers keep
//! the original search ordering (graceful degradation, not failure).

use anyhow::{bail, Result};
use tracing::warn;

use crate::config::RerankConfig;
use crate::models::SearchHit;

const COHERE_RERANK_URL: &str = "https://api.cohere.com/v1/rerank";

/// Reorder `hits` by provider relevance, keeping content unchanged.
///
/// Returns the original ordering when the provider is disabled or fails.
pub async fn rerank_hits(config: &RerankConfig, query: &str, hits: Vec<SearchHit>) -> Vec<SearchHit> {
    if !config.is_enabled() || hits.is_empty() {
        return hits;
    }

    match try_rerank(config, query, &hits).await {
        Ok(order) => {
            let mut slots: Vec<Option<SearchHit>> = hits.into_iter().map(Some).collect();
            let mut reordered = Vec::with_capacity(slots.len());
            for index in order {
                if let Some(hit) = slots.get_mut(index).and_then(|s| s.take()) {
                    reordered.push(hit);
                }
            }
            // Providers occasionally return fewer indices than documents;
            // keep the remainder in original order.
            reordered.extend(slots.into_iter().flatten());
            reordered
        }
        Err(err) => {
            warn!(error = %err, "rerank failed, using original ordering");
            hits
        }
    }
}

/// Ask the provider for the relevance ordering of `hits`.
///
/// Returns document indices, most relevant first.
async fn try_rerank(config: &RerankConfig, query: &str, hits: &[SearchHit]) -> Result<Vec<usize>> {
    match config.provider.as_str() {
        "cohere" => rerank_cohere(config, query, hits).await,
        "disabled" => bail!("rerank provider is disabled"),
        other => bail!("Unknown rerank provider: {}", other),
    }
}

async fn rerank_cohere(
    config: &RerankConfig,
    query: &str,
    hits: &[SearchHit],
) -> Result<Vec<usize>> {
    let api_key = std::env::var(&config.api_key_env)
        .map_err(|_| anyhow::anyhow!("{} not set", config.api_key_env))?;

    let url = config
        .base_url
        .as_deref()
        .map(|base| format!("{}/v1/rerank", base.trim_end_matches('/')))
        .unwrap_or_else(|| COHERE_RERANK_URL.to_string());

    let documents: Vec<&str> = hits.iter().map(|h| h.content.as_str()).collect();
    let body = serde_json::json!({
        "model": config.model,
        "query": query,
        "documents": documents,
    });

    let client = reqwest::Client::new();
    let response = client
        .post(url)
        .header("Authorization", format!("Bearer {api_key}"))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        bail!("rerank API error {status}: {text}");
    }

    let json: serde_json::Value = response.json().await?;
    parse_rerank_response(&json)
}

/// Extract `results[].index` in ranked order.
fn parse_rerank_response(json: &serde_json::Value) -> Result<Vec<usize>> {
    let results = json
        .get("results")
        .and_then(|r| r.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid rerank response: missing results array"))?;

    let mut order = Vec::with_capacity(results.len());
    for item in results {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .ok_or_else(|| anyhow::anyhow!("Invalid rerank response: missing index"))?;
        order.push(index as usize);
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(content: &str) -> SearchHit {
        SearchHit {
            content: content.to_string(),
            ontology_id: "X".to_string(),
            version: "1".to_string(),
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_parse_rerank_response_order() {
        let json = serde_json::json!({
            "results": [
                {"index": 2, "relevance_score": 0.9},
                {"index": 0, "relevance_score": 0.5},
                {"index": 1, "relevance_score": 0.1},
            ]
        });
        assert_eq!(parse_rerank_response(&json).unwrap(), vec![2, 0, 1]);
    }

    #[test]
    fn test_parse_rerank_response_invalid() {
        assert!(parse_rerank_response(&serde_json::json!({})).is_err());
    }

    #[tokio::test]
    async fn test_disabled_provider_keeps_order() {
        let config = RerankConfig::default();
        let hits = vec![hit("a"), hit("b")];
        let out = rerank_hits(&config, "q", hits).await;
        assert_eq!(out[0].content, "a");
        assert_eq!(out[1].content, "b");
    }

    #[tokio::test]
    async fn test_unreachable_provider_degrades_to_original_order() {
        let config = RerankConfig {
            provider: "cohere".to_string(),
            base_url: Some("http://127.0.0.1:9".to_string()),
            api_key_env: "RERANK_TEST_KEY".to_string(),
            ..RerankConfig::default()
        };
        std::env::set_var("RERANK_TEST_KEY", "dummy");

        let hits = vec![hit("first"), hit("second")];
        let out = rerank_hits(&config, "q", hits).await;
        assert_eq!(out[0].content, "first");
        assert_eq!(out[1].content, "second");
    }
}
