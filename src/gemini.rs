use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;

use crate::translate::{GenerationParams, Generator};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub fn generate_content_endpoint(base_url: &str, model: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/models/{model}:generateContent")
}

#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(base_url: &str, api_key: String, request_timeout: Duration) -> anyhow::Result<Self> {
        if api_key.trim().is_empty() {
            anyhow::bail!("Gemini API key is empty");
        }
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url: base_url.to_owned(),
            api_key,
        })
    }

    /// Reads the API key from `GEMINI_API_KEY`.
    pub fn from_env(base_url: &str, request_timeout: Duration) -> anyhow::Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY is not set"))?;
        Self::new(base_url, api_key, request_timeout)
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> anyhow::Result<String> {
        let endpoint = generate_content_endpoint(&self.base_url, model);
        let body = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [ { "text": prompt } ] }
            ],
            "generationConfig": {
                "temperature": params.temperature,
                "topP": params.top_p,
                "topK": params.top_k,
                "maxOutputTokens": params.max_output_tokens,
            },
        });

        let response = self
            .client
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {endpoint}"))?;

        let status = response.status();
        let raw = response.text().await.context("read Gemini response body")?;
        if !status.is_success() {
            let message = parse_error_message(&raw).unwrap_or_else(|| raw.clone());
            anyhow::bail!("Gemini API error ({status}): {message}");
        }

        let value: serde_json::Value = serde_json::from_str(&raw).context("parse Gemini response")?;
        extract_candidate_text(&value).context("extract candidate text")
    }
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

fn extract_candidate_text(value: &serde_json::Value) -> anyhow::Result<String> {
    if let Some(reason) = value
        .pointer("/promptFeedback/blockReason")
        .and_then(|v| v.as_str())
    {
        anyhow::bail!("prompt blocked: {reason}");
    }

    let candidate = value
        .get("candidates")
        .and_then(|v| v.as_array())
        .and_then(|candidates| candidates.first())
        .ok_or_else(|| anyhow::anyhow!("missing `candidates` in response"))?;

    let mut text = String::new();
    if let Some(parts) = candidate.pointer("/content/parts").and_then(|v| v.as_array()) {
        for part in parts {
            let Some(part_text) = part.get("text").and_then(|v| v.as_str()) else {
                continue;
            };
            text.push_str(part_text);
        }
    }

    if text.trim().is_empty() {
        let finish_reason = candidate
            .get("finishReason")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        anyhow::bail!("Gemini output text is empty (finishReason: {finish_reason})");
    }
    Ok(text)
}
