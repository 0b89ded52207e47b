use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub sanitize: SanitizeConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Base URL of the vector store, e.g. `http://localhost:8080`.
    pub url: String,
    #[serde(default = "default_class_name")]
    pub class_name: String,
    #[serde(default = "default_store_key_env")]
    pub api_key_env: String,
}

fn default_class_name() -> String {
    "OntologyChunk".to_string()
}
fn default_store_key_env() -> String {
    "STORE_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_url")]
    pub base_url: String,
    #[serde(default = "default_catalog_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_catalog_timeout")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_url(),
            api_key_env: default_catalog_key_env(),
            page_size: default_page_size(),
            timeout_secs: default_catalog_timeout(),
        }
    }
}

fn default_catalog_url() -> String {
    "https://rest.matportal.org".to_string()
}
fn default_catalog_key_env() -> String {
    "CATALOG_API_KEY".to_string()
}
fn default_page_size() -> usize {
    200
}
fn default_catalog_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RerankConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_rerank_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_rerank_key_env")]
    pub api_key_env: String,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_rerank_model(),
            base_url: None,
            api_key_env: default_rerank_key_env(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_rerank_model() -> String {
    "rerank-english-v2.0".to_string()
}
fn default_rerank_key_env() -> String {
    "COHERE_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_generation_key_env")]
    pub api_key_env: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_generation_model(),
            base_url: None,
            api_key_env: default_generation_key_env(),
        }
    }
}

fn default_generation_model() -> String {
    "gpt-4o".to_string()
}
fn default_generation_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SanitizeConfig {
    /// Opt-in for the external repair/convert tool.
    #[serde(default)]
    pub robot_enabled: bool,
    /// Path to the repair tool jar; required when `robot_enabled` is set.
    #[serde(default)]
    pub robot_jar_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_sync_interval")]
    pub interval_minutes: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: default_sync_interval(),
        }
    }
}

fn default_sync_interval() -> u64 {
    1440
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

impl RerankConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.store.url.trim().is_empty() {
        anyhow::bail!("store.url must not be empty");
    }

    if !(60..=1440).contains(&config.sync.interval_minutes) {
        anyhow::bail!("sync.interval_minutes must be between 60 and 1440 (inclusive)");
    }

    if config.sanitize.robot_enabled && config.sanitize.robot_jar_path.is_none() {
        anyhow::bail!("sanitize.robot_jar_path must be set when sanitize.robot_enabled is true");
    }

    match config.rerank.provider.as_str() {
        "disabled" | "cohere" => {}
        other => anyhow::bail!(
            "Unknown rerank provider: '{}'. Must be disabled or cohere.",
            other
        ),
    }

    match config.generation.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(config)
}
