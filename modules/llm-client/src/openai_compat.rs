use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{error_for_status, CompletionError, Result};
use crate::traits::CompletionClient;

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1";
const MISTRAL_API_URL: &str = "https://api.mistral.ai/v1";

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(120);

/// Chat-completions client for everything speaking the OpenAI wire shape:
/// Groq, Mistral, and local servers like LM Studio.
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    name: &'static str,
    /// Cloud endpoints want `Authorization: Bearer <key>`; local ones
    /// accept anonymous requests.
    bearer_auth: bool,
}

impl OpenAiCompatClient {
    pub fn groq(model: &str) -> Self {
        Self::build(GROQ_API_URL, model, "groq", true)
    }

    pub fn mistral(model: &str) -> Self {
        Self::build(MISTRAL_API_URL, model, "mistral", true)
    }

    /// Local OpenAI-compatible server (LM Studio, llama.cpp, ...).
    /// `base_url` is the server root; `/v1` is appended here.
    pub fn local(base_url: &str, model: &str) -> Self {
        let base = format!("{}/v1", base_url.trim_end_matches('/'));
        Self::build(&base, model, "openai-compat", false)
    }

    fn build(base_url: &str, model: &str, name: &'static str, bearer_auth: bool) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(COMPLETION_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.to_string(),
            model: model.to_string(),
            name,
            bearer_auth,
        }
    }

    fn headers(&self, api_key: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if self.bearer_auth {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {api_key}"))
                    .map_err(|e| CompletionError::Network(e.to_string()))?,
            );
        }
        Ok(headers)
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    async fn complete(&self, prompt: &str, api_key: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(provider = self.name, model = %self.model, "Chat completion request");

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.1,
            max_tokens: 2048,
        };

        let response = self
            .http
            .post(&url)
            .headers(self.headers(api_key)?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let data: ChatResponse = response.json().await?;
        data.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.is_empty())
            .ok_or(CompletionError::EmptyResponse)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_base_url_gets_v1_suffix() {
        let client = OpenAiCompatClient::local("http://localhost:1234/", "local-model");
        assert_eq!(client.base_url, "http://localhost:1234/v1");
        assert!(!client.bearer_auth);
    }

    #[test]
    fn reply_content_extracted_from_first_choice() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap();
        assert_eq!(content, "hello");
    }

    #[test]
    fn null_content_is_none() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
