use std::path::PathBuf;
use std::time::Duration;

use llm_client::Provider;

/// Application configuration loaded from environment variables (with
/// `.env` support). Everything has a default except cloud credentials,
/// which `validate` checks before a run starts.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub provider: Provider,
    pub model: String,
    /// Server root for local providers; ignored by cloud providers.
    pub base_url: String,
    /// Ordered credential pool, rotated on transient failures.
    pub api_keys: Vec<String>,
    /// Pause between cards, sized for free-tier completion rate limits.
    pub scrape_delay: Duration,
    /// Per-request timeout for page fetches.
    pub scrape_timeout: Duration,
    pub user_agent: String,
    pub data_dir: PathBuf,
}

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let provider = Provider::parse(
            &std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "gemini".to_string()),
        );

        // Model names pasted into .env files show up with stray quotes.
        let model = std::env::var("LLM_MODEL")
            .map(|m| m.trim().trim_matches('"').trim_matches('\'').to_string())
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| provider.default_model().to_string());

        Self {
            provider,
            model,
            base_url: std::env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            api_keys: api_keys_from_env(provider),
            scrape_delay: Duration::from_secs_f64(env_f64("SCRAPE_DELAY", 120.0)),
            scrape_timeout: Duration::from_secs_f64(env_f64("SCRAPE_TIMEOUT", 30.0)),
            user_agent: std::env::var("SCRAPE_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
            data_dir: PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string())),
        }
    }

    pub fn sources_path(&self) -> PathBuf {
        self.data_dir.join("card_sources.json")
    }

    pub fn cards_path(&self) -> PathBuf {
        self.data_dir.join("cards.json")
    }

    pub fn run_log_path(&self) -> PathBuf {
        self.data_dir.join("update_log.txt")
    }

    /// Configuration problems that must stop the run before any card is
    /// processed. Returns an empty list when the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.provider.is_cloud() && self.api_keys.is_empty() {
            let prefix = provider_env_prefix(self.provider).unwrap_or("PROVIDER");
            errors.push(format!(
                "{prefix}_API_KEY or {prefix}_API_KEYS not set for provider {}",
                self.provider
            ));
        }

        if !self.data_dir.exists() {
            errors.push(format!("Data directory not found: {}", self.data_dir.display()));
        }

        errors
    }

    pub fn log_redacted(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  LLM_PROVIDER: {}", self.provider);
        tracing::info!("  LLM_MODEL: {}", self.model);
        if self.provider.is_cloud() {
            if self.api_keys.is_empty() {
                tracing::info!("  API keys: <not set>");
            } else {
                tracing::info!("  API keys: {} configured", self.api_keys.len());
                for (i, key) in self.api_keys.iter().enumerate() {
                    tracing::info!("    [{}] {}", i + 1, mask_key(key));
                }
            }
        } else {
            tracing::info!("  LLM_BASE_URL: {}", self.base_url);
        }
        tracing::info!("  SCRAPE_DELAY: {:?}", self.scrape_delay);
        tracing::info!("  SCRAPE_TIMEOUT: {:?}", self.scrape_timeout);
        tracing::info!("  DATA_DIR: {}", self.data_dir.display());
    }
}

fn env_f64(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|v: &f64| v.is_finite() && *v >= 0.0)
        .unwrap_or(default)
}

fn provider_env_prefix(provider: Provider) -> Option<&'static str> {
    match provider {
        Provider::Gemini => Some("GEMINI"),
        Provider::Groq => Some("GROQ"),
        Provider::Mistral => Some("MISTRAL"),
        _ => None,
    }
}

/// Read the credential pool for a cloud provider. The plural
/// `{PREFIX}_API_KEYS` variable (comma-separated) takes precedence over the
/// single-key form; entries are trimmed and empties dropped. Local
/// providers get an empty pool.
fn api_keys_from_env(provider: Provider) -> Vec<String> {
    let Some(prefix) = provider_env_prefix(provider) else {
        return Vec::new();
    };

    if let Ok(multi) = std::env::var(format!("{prefix}_API_KEYS")) {
        let keys: Vec<String> = multi
            .split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if !keys.is_empty() {
            return keys;
        }
    }

    match std::env::var(format!("{prefix}_API_KEY")) {
        Ok(key) if !key.trim().is_empty() => vec![key.trim().to_string()],
        _ => Vec::new(),
    }
}

fn mask_key(key: &str) -> String {
    if key.len() > 10 {
        format!("{}...{}", &key[..6], &key[key.len() - 4..])
    } else {
        "****".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test touches its own provider's env vars so the parallel test
    // runner cannot interleave reads and writes of the same variable.

    #[test]
    fn plural_keys_take_precedence_and_are_trimmed() {
        std::env::set_var("GROQ_API_KEYS", "a, b,,c ");
        std::env::set_var("GROQ_API_KEY", "single");
        assert_eq!(api_keys_from_env(Provider::Groq), vec!["a", "b", "c"]);
        std::env::remove_var("GROQ_API_KEYS");
        std::env::remove_var("GROQ_API_KEY");
    }

    #[test]
    fn single_key_used_when_plural_unset() {
        std::env::set_var("MISTRAL_API_KEY", "only-one");
        assert_eq!(api_keys_from_env(Provider::Mistral), vec!["only-one"]);
        std::env::remove_var("MISTRAL_API_KEY");
    }

    #[test]
    fn local_provider_has_empty_pool() {
        assert!(api_keys_from_env(Provider::Ollama).is_empty());
    }

    #[test]
    fn mask_key_hides_middle() {
        let masked = mask_key("gsk_1234567890abcdef");
        assert!(masked.starts_with("gsk_12"));
        assert!(masked.ends_with("cdef"));
        assert!(!masked.contains("34567890"));
        assert_eq!(mask_key("short"), "****");
    }
}
