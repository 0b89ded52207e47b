//! REST client for the ontology catalog.
//!
//! Lists ontologies with their latest submissions (handling pagination
//! and link indirection) and downloads submission payloads. All requests
//! share one client with a fixed timeout.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::CatalogConfig;
use crate::models::OntologyRecord;

pub struct CatalogClient {
    client: reqwest::Client,
    base_url: String,
    page_size: usize,
    api_key: Option<String>,
}

impl CatalogClient {
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
            api_key,
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Retrieve all ontologies and resolve their latest submissions.
    ///
    /// Skips ontology views (they mirror a primary ontology) and records
    /// missing an acronym, submission link, download link, or submission
    /// id. A missing version falls back to the submission id.
    pub async fn list_latest_submissions(&self) -> Result<Vec<OntologyRecord>> {
        let mut records = Vec::new();

        for ontology in self.fetch_all_ontologies().await? {
            if ontology.get("viewOf").is_some_and(|v| !v.is_null()) {
                continue;
            }

            let Some(acronym) = ontology.get("acronym").and_then(|a| a.as_str()) else {
                debug!("skipping ontology without an acronym");
                continue;
            };
            let name = ontology
                .get("name")
                .and_then(|n| n.as_str())
                .unwrap_or(acronym);

            let Some(submission_url) = extract_link(&ontology, "latest_submission") else {
                debug!(acronym, "no latest submission link");
                continue;
            };

            let submission = match self.get_json(&submission_url).await {
                Ok(payload) => payload,
                Err(err) => {
                    error!(acronym, error = %err, "failed to fetch latest submission");
                    continue;
                }
            };

            let Some(download_url) = extract_link(&submission, "download") else {
                debug!(acronym, "no download link for latest submission");
                continue;
            };
            let Some(submission_id) = submission.get("submissionId").and_then(|s| s.as_i64())
            else {
                debug!(acronym, "latest submission missing submissionId");
                continue;
            };

            let version = submission
                .get("version")
                .and_then(|v| v.as_str())
                .filter(|v| !v.is_empty())
                .map(|v| v.to_string())
                .unwrap_or_else(|| submission_id.to_string());

            records.push(OntologyRecord {
                acronym: acronym.to_string(),
                name: name.to_string(),
                submission_id,
                version,
                download_url,
                ontology_iri: ontology
                    .get("@id")
                    .and_then(|i| i.as_str())
                    .map(|i| i.to_string()),
            });
        }

        info!(
            count = records.len(),
            "discovered ontologies with downloadable submissions"
        );
        Ok(records)
    }

    /// Download the ontology file behind a submission's download link.
    pub async fn download(&self, download_url: &str) -> Result<Vec<u8>> {
        let response = self.request(download_url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        debug!(bytes = bytes.len(), url = download_url, "downloaded submission");
        Ok(bytes.to_vec())
    }

    async fn fetch_all_ontologies(&self) -> Result<Vec<serde_json::Value>> {
        let mut all = Vec::new();
        let mut page = 1usize;

        loop {
            let url = format!("{}/ontologies", self.base_url);
            let response = self
                .request(&url)
                .query(&[
                    ("page", page.to_string()),
                    ("pagesize", self.page_size.to_string()),
                    ("include", "acronym,name,viewOf,links".to_string()),
                ])
                .send()
                .await
                .with_context(|| format!("failed to fetch ontologies page {page}"))?
                .error_for_status()?;

            let payload: serde_json::Value = response.json().await?;
            let items = extract_collection(&payload);
            if items.is_empty() {
                break;
            }

            let item_count = items.len();
            all.extend(items);
            if item_count < self.page_size {
                break;
            }
            page += 1;
        }

        Ok(all)
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let response = self.request(url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    /// Build a GET request, resolving relative paths against the base URL
    /// and attaching authentication when configured.
    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let target = if url.starts_with("http") {
            url.to_string()
        } else {
            format!("{}{}", self.base_url, url)
        };
        let mut builder = self.client.get(target).header("Accept", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("apikey token={key}"));
        }
        builder
    }
}

fn extract_collection(payload: &serde_json::Value) -> Vec<serde_json::Value> {
    if let Some(list) = payload.as_array() {
        return list.clone();
    }
    for key in ["collection", "ontologies"] {
        if let Some(list) = payload.get(key).and_then(|v| v.as_array()) {
            return list.clone();
        }
    }
    debug!("unexpected payload format when extracting ontology collection");
    Vec::new()
}

/// Resolve a relation link from a payload's `links` map, falling back to
/// `{@id}/{rel}` when the map is absent.
fn extract_link(payload: &serde_json::Value, rel: &str) -> Option<String> {
    if let Some(url) = payload
        .pointer(&format!("/links/{rel}"))
        .and_then(|v| v.as_str())
        .filter(|u| !u.is_empty())
    {
        return Some(url.to_string());
    }
    payload
        .get("@id")
        .and_then(|i| i.as_str())
        .map(|id| format!("{}/{}", id.trim_end_matches('/'), rel))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_collection_shapes() {
        let list = serde_json::json!([{"acronym": "A"}]);
        assert_eq!(extract_collection(&list).len(), 1);

        let wrapped = serde_json::json!({"collection": [{"acronym": "A"}, {"acronym": "B"}]});
        assert_eq!(extract_collection(&wrapped).len(), 2);

        let named = serde_json::json!({"ontologies": [{"acronym": "A"}]});
        assert_eq!(extract_collection(&named).len(), 1);

        let unexpected = serde_json::json!({"data": []});
        assert!(extract_collection(&unexpected).is_empty());
    }

    #[test]
    fn test_extract_link_prefers_links_map() {
        let payload = serde_json::json!({
            "@id": "https://example.org/ontologies/MAT",
            "links": {"download": "https://example.org/download/MAT"}
        });
        assert_eq!(
            extract_link(&payload, "download").as_deref(),
            Some("https://example.org/download/MAT")
        );
    }

    #[test]
    fn test_extract_link_falls_back_to_id() {
        let payload = serde_json::json!({"@id": "https://example.org/ontologies/MAT/"});
        assert_eq!(
            extract_link(&payload, "latest_submission").as_deref(),
            Some("https://example.org/ontologies/MAT/latest_submission")
        );
    }

    #[test]
    fn test_extract_link_missing() {
        assert_eq!(extract_link(&serde_json::json!({}), "download"), None);
    }
}
