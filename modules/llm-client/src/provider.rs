use std::time::Duration;

use tracing::info;

use crate::error::{error_for_status, Result};
use crate::gemini::GeminiClient;
use crate::ollama::OllamaClient;
use crate::openai_compat::OpenAiCompatClient;
use crate::traits::CompletionClient;

/// Supported completion providers. Anything unrecognized is treated as a
/// local OpenAI-compatible server so new local runtimes work without a
/// code change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Groq,
    Mistral,
    Ollama,
    OpenAiCompat,
}

impl Provider {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Provider::Gemini,
            "groq" => Provider::Groq,
            "mistral" => Provider::Mistral,
            "ollama" => Provider::Ollama,
            _ => Provider::OpenAiCompat,
        }
    }

    /// Cloud providers require at least one API key.
    pub fn is_cloud(self) -> bool {
        matches!(self, Provider::Gemini | Provider::Groq | Provider::Mistral)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::Groq => "groq",
            Provider::Mistral => "mistral",
            Provider::Ollama => "ollama",
            Provider::OpenAiCompat => "openai-compat",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-2.0-flash-exp",
            Provider::Groq => "llama-3.3-70b-versatile",
            Provider::Mistral => "mistral-small-latest",
            Provider::Ollama => "llama3.2",
            Provider::OpenAiCompat => "local-model",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the completion client for a provider. `base_url` is only used by
/// local providers.
pub fn build_client(provider: Provider, model: &str, base_url: &str) -> Box<dyn CompletionClient> {
    match provider {
        Provider::Gemini => Box::new(GeminiClient::new(model)),
        Provider::Groq => Box::new(OpenAiCompatClient::groq(model)),
        Provider::Mistral => Box::new(OpenAiCompatClient::mistral(model)),
        Provider::Ollama => Box::new(OllamaClient::new(base_url, model)),
        Provider::OpenAiCompat => Box::new(OpenAiCompatClient::local(base_url, model)),
    }
}

/// Check that a local provider is reachable before starting a run.
/// Cloud providers are a no-op here; their first real call surfaces errors.
pub async fn probe_local(provider: Provider, base_url: &str) -> Result<()> {
    if provider.is_cloud() {
        return Ok(());
    }

    let base = base_url.trim_end_matches('/');
    let url = match provider {
        Provider::Ollama => format!("{base}/api/tags"),
        _ => format!("{base}/v1/models"),
    };

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("Failed to build HTTP client");

    let response = http.get(&url).send().await?;
    if !response.status().is_success() {
        return Err(error_for_status(response).await);
    }

    info!(provider = provider.as_str(), "Local LLM is available");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_providers() {
        assert_eq!(Provider::parse("gemini"), Provider::Gemini);
        assert_eq!(Provider::parse("Groq"), Provider::Groq);
        assert_eq!(Provider::parse(" mistral "), Provider::Mistral);
        assert_eq!(Provider::parse("ollama"), Provider::Ollama);
    }

    #[test]
    fn unknown_provider_falls_back_to_openai_compat() {
        assert_eq!(Provider::parse("lmstudio"), Provider::OpenAiCompat);
        assert_eq!(Provider::parse("llamacpp"), Provider::OpenAiCompat);
    }

    #[test]
    fn cloud_classification() {
        assert!(Provider::Gemini.is_cloud());
        assert!(Provider::Groq.is_cloud());
        assert!(Provider::Mistral.is_cloud());
        assert!(!Provider::Ollama.is_cloud());
        assert!(!Provider::OpenAiCompat.is_cloud());
    }
}
