//! Provider selection for the classifier model

use super::{AnthropicService, LlmError, LlmService, LoggingService, OllamaService};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434/api/chat";
pub const DEFAULT_OLLAMA_MODEL: &str = "mistral";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-20241022";

/// Which backend serves classification requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    #[default]
    Ollama,
    Anthropic,
}

impl Provider {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Some(Provider::Ollama),
            "anthropic" | "claude" => Some(Provider::Anthropic),
            _ => None,
        }
    }
}

/// Configuration for LLM providers
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: Provider,
    pub ollama_url: String,
    pub ollama_model: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    /// Per-request HTTP timeout
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            anthropic_api_key: None,
            anthropic_model: DEFAULT_ANTHROPIC_MODEL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl LlmConfig {
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let provider = match get("LLM_PROVIDER") {
            Some(name) => Provider::parse(&name).unwrap_or_else(|| {
                tracing::warn!(provider = %name, "Unknown LLM_PROVIDER, falling back to ollama");
                Provider::Ollama
            }),
            None => defaults.provider,
        };

        Self {
            provider,
            ollama_url: get("OLLAMA_HOST").unwrap_or(defaults.ollama_url),
            ollama_model: get("OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            anthropic_api_key: get("ANTHROPIC_API_KEY").filter(|k| !k.is_empty()),
            anthropic_model: get("ANTHROPIC_MODEL").unwrap_or(defaults.anthropic_model),
            timeout: get("CLASSIFIER_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map_or(defaults.timeout, Duration::from_secs),
        }
    }
}

/// Build the configured provider, wrapped with request logging
pub fn create_service(config: &LlmConfig) -> Result<Arc<dyn LlmService>, LlmError> {
    let service: Arc<dyn LlmService> = match config.provider {
        Provider::Ollama => Arc::new(OllamaService::new(
            config.ollama_url.clone(),
            config.ollama_model.clone(),
            config.timeout,
        )?),
        Provider::Anthropic => {
            let api_key = config
                .anthropic_api_key
                .clone()
                .ok_or_else(|| LlmError::auth("ANTHROPIC_API_KEY is not set"))?;
            Arc::new(AnthropicService::new(
                api_key,
                config.anthropic_model.clone(),
                config.timeout,
            )?)
        }
    };

    Ok(Arc::new(LoggingService::new(service)))
}
