//! Non-streaming JSON chat completions against OpenAI-compatible APIs
//! (Groq, OpenAI).

use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::LlmConfig;
use linkweave_core::{Error, Result};

fn upstream(e: impl std::fmt::Display) -> Error {
    Error::UpstreamUnavailable(format!("LLM: {}", e))
}

pub struct ChatClient {
    client: Client,
    config: LlmConfig,
}

impl ChatClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(upstream)?;
        Ok(Self { client, config })
    }

    /// Send one system + user exchange and parse the reply as a JSON object.
    pub async fn complete_json(&self, system_prompt: &str, user_content: &str) -> Result<Value> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| upstream("no API key configured"))?;

        let body = json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "stream": false,
            "response_format": {"type": "json_object"},
            "messages": [
                {
                    "role": "system",
                    "content": format!(
                        "{}\n\nRespond with a single valid JSON object only. Do not include any \
                         markdown, code fences, or explanatory text.",
                        system_prompt
                    ),
                },
                {"role": "user", "content": user_content},
            ],
        });

        let url = self.config.chat_completions_url();
        debug!("Requesting {} with model {}", url, self.config.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(upstream)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(upstream(format!("API error {}: {}", status, text)));
        }

        let payload: Value = response.json().await.map_err(upstream)?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| upstream("response has no message content"))?;
        extract_json_object(content)
    }
}

/// Parse `text` as JSON, or failing that the span from the first `{` to the
/// last `}` (models sometimes wrap JSON in prose or code fences).
pub fn extract_json_object(text: &str) -> Result<Value> {
    let text = text.trim();
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }

    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(upstream("output did not contain a JSON object"));
    };
    if end <= start {
        return Err(upstream("output did not contain a JSON object"));
    }
    serde_json::from_str(&text[start..=end]).map_err(upstream)
}
