//! Answer generation provider abstraction.
//!
//! Builds a prompt that constrains the model to answer only from the
//! retrieved context and returns its output verbatim (trimmed). When the
//! provider is disabled or fails, the caller falls back to returning the
//! raw context with an explicit disclaimer.

use anyhow::{bail, Result};

use crate::config::GenerationConfig;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// The context-only answering instruction handed to the model.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are an expert assistant for answering questions about ontologies.\n\
         Your answer must be based *only* on the context provided.\n\
         If the context does not contain the information needed to answer the question, state that you cannot answer.\n\
         Do not make up information. Be concise and accurate.\n\n\
         CONTEXT:\n\
         ---\n\
         {context}\n\
         ---\n\n\
         QUESTION: {question}\n\n\
         ANSWER:"
    )
}

/// Generate an answer from the assembled context.
///
/// Errors propagate so the caller can apply the raw-context fallback.
pub async fn generate_answer(
    config: &GenerationConfig,
    context: &str,
    question: &str,
) -> Result<String> {
    match config.provider.as_str() {
        "openai" => generate_openai(config, context, question).await,
        "disabled" => bail!("generation provider is disabled"),
        other => bail!("Unknown generation provider: {}", other),
    }
}

async fn generate_openai(
    config: &GenerationConfig,
    context: &str,
    question: &str,
) -> Result<String> {
    let api_key = std::env::var(&config.api_key_env)
        .map_err(|_| anyhow::anyhow!("{} not set", config.api_key_env))?;

    let url = config
        .base_url
        .as_deref()
        .map(|base| format!("{}/v1/chat/completions", base.trim_end_matches('/')))
        .unwrap_or_else(|| OPENAI_CHAT_URL.to_string());

    let body = serde_json::json!({
        "model": config.model,
        "temperature": 0,
        "messages": [
            {"role": "user", "content": build_prompt(context, question)}
        ],
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
        bail!("generation API error {status}: {text}");
    }

    let json: serde_json::Value = response.json().await?;
    parse_chat_response(&json)
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid generation response: missing message content"))
}
