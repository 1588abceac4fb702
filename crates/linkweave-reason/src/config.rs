//! LLM provider configuration from the environment.

use std::time::Duration;

use tracing::warn;

use crate::types::LlmProvider;

#[derive(Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<String>,
    pub model: String,
    /// Base URL of an OpenAI-compatible API, without `/chat/completions`.
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl LlmConfig {
    /// Provider defaults with no API key.
    pub fn new(provider: LlmProvider) -> Self {
        Self {
            provider,
            api_key: None,
            model: provider.default_model().to_string(),
            base_url: provider.default_base_url().to_string(),
            temperature: 0.2,
            max_tokens: 2048,
            timeout: Duration::from_secs(30),
        }
    }

    /// Read `LINKWEAVE_LLM_PROVIDER`, the provider's API key variable,
    /// `LINKWEAVE_LLM_MODEL` and `LINKWEAVE_LLM_BASE_URL`.
    pub fn from_env() -> Self {
        let provider = match std::env::var("LINKWEAVE_LLM_PROVIDER") {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("{}, using groq", e);
                LlmProvider::Groq
            }),
            Err(_) => LlmProvider::Groq,
        };

        let key_var = match provider {
            LlmProvider::Groq => "GROQ_API_KEY",
            LlmProvider::OpenAI => "OPENAI_API_KEY",
        };

        let mut config = Self::new(provider);
        config.api_key = non_empty_env(key_var);
        if let Some(model) = non_empty_env("LINKWEAVE_LLM_MODEL") {
            config.model = model;
        }
        if let Some(url) = non_empty_env("LINKWEAVE_LLM_BASE_URL") {
            config.base_url = url;
        }
        config
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

// Keeps the API key out of logs.
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
