use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{error_for_status, CompletionError, Result};
use crate::traits::CompletionClient;

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(120);

pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(COMPLETION_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    async fn complete(&self, prompt: &str, _api_key: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        debug!(model = %self.model, "Ollama generate request");

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature: 0.1 },
        };

        let response = self.http.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let data: GenerateResponse = response.json().await?;
        if data.response.is_empty() {
            return Err(CompletionError::EmptyResponse);
        }
        Ok(data.response)
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}
