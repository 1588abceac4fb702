//! Relation analyzer: asks an LLM to resolve entities across a focus document
//! and its candidates, and to extract relations between them.

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::config::LlmConfig;
use crate::providers::ChatClient;
use crate::types::{AnalysisDocument, RelationAnalysis};
use linkweave_core::{Error, Result};

/// External reasoning collaborator. Any error means "unavailable"; callers
/// fall back to graph-only answers.
#[async_trait]
pub trait RelationAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        focus: &AnalysisDocument,
        related: &[AnalysisDocument],
    ) -> Result<RelationAnalysis>;
}

const SYSTEM_PROMPT: &str = "You are an expert information extraction engine. Given a focus \
document and a small set of related documents, you must perform (1) cross-document entity \
resolution and (2) relation extraction between entities.\n\n\
Cross-document entity resolution: identify real-world entities that may be mentioned with \
slightly different surface forms (e.g. 'OpenAI', 'OpenAI, Inc.', 'the company OpenAI'). Map all \
such mentions to a single canonical entity id.\n\n\
Relation extraction: infer meaningful relationships between entities across documents (e.g. \
WORKS_FOR, FOUNDED, LOCATED_IN, ACQUIRED, PART_OF). If no clear relation exists, you may omit \
it.\n\n\
Focus on high-precision entities and relations; do NOT invent facts that are not clearly \
supported by the text.";

const RESPONSE_SCHEMA: &str = r#"{
  "entities": [
    {"id": "string", "type": "string", "mentions": [{"doc_id": "string", "text": "string"}]}
  ],
  "relations": [
    {"source": "entity_id", "target": "entity_id", "relation": "string", "evidence_doc_id": "string"}
  ]
}"#;

/// Truncate to at most `max_chars` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

pub fn build_user_prompt(focus: &AnalysisDocument, related: &[AnalysisDocument]) -> String {
    let input = json!({
        "focus_document": focus,
        "related_documents": related,
    });
    format!(
        "You are given JSON with a focus document and a small list of related documents. \
         Extract canonical entities and relations. Use this exact JSON schema in your reply:\n\n\
         {}\n\nHere is the input JSON you should analyze:\n\n{}",
        RESPONSE_SCHEMA, input
    )
}

/// [`RelationAnalyzer`] backed by an OpenAI-compatible chat completion API.
pub struct LlmAnalyzer {
    client: ChatClient,
}

impl LlmAnalyzer {
    pub fn new(config: LlmConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(Error::InvalidArgument(format!(
                "no API key configured for {}",
                config.provider
            )));
        }
        info!("LLM relation analyzer enabled: {:?}", config);
        Ok(Self {
            client: ChatClient::new(config)?,
        })
    }

    /// Analyzer from the environment, or `None` when no key is set.
    pub fn from_env() -> Option<Self> {
        Self::new(LlmConfig::from_env()).ok()
    }
}

#[async_trait]
impl RelationAnalyzer for LlmAnalyzer {
    async fn analyze(
        &self,
        focus: &AnalysisDocument,
        related: &[AnalysisDocument],
    ) -> Result<RelationAnalysis> {
        let value = self
            .client
            .complete_json(SYSTEM_PROMPT, &build_user_prompt(focus, related))
            .await?;
        serde_json::from_value(value)
            .map_err(|e| Error::UpstreamUnavailable(format!("LLM returned an unexpected shape: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LlmProvider;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::Value;

    fn doc(id: &str, text: &str) -> AnalysisDocument {
        AnalysisDocument {
            doc_id: id.into(),
            text: text.into(),
        }
    }

    /// Serve a fake chat-completions endpoint and return its base URL.
    async fn stub_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/v1", addr)
    }

    fn analyzer(base_url: String) -> LlmAnalyzer {
        LlmAnalyzer::new(
            LlmConfig::new(LlmProvider::Groq)
                .with_api_key("test-key")
                .with_base_url(base_url),
        )
        .unwrap()
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdefghij", 6), "abc...");
        assert_eq!(truncate_chars("héllo wörld", 8), "héllo...");
    }

    #[test]
    fn test_prompt_embeds_documents() {
        let prompt = build_user_prompt(&doc("d1", "focus text"), &[doc("d2", "other text")]);
        assert!(prompt.contains("\"focus_document\""));
        assert!(prompt.contains("\"doc_id\":\"d2\""));
        assert!(prompt.contains("evidence_doc_id"));
    }

    #[test]
    fn test_requires_api_key() {
        assert!(LlmAnalyzer::new(LlmConfig::new(LlmProvider::Groq)).is_err());
    }

    #[tokio::test]
    async fn test_analyze_parses_completion() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["response_format"]["type"], "json_object");
                let content = json!({
                    "entities": [{
                        "id": "e1",
                        "type": "LANGUAGE",
                        "mentions": [{"doc_id": "d2", "text": "Python"}]
                    }],
                    "relations": []
                })
                .to_string();
                Json(json!({"choices": [{"message": {"role": "assistant", "content": content}}]}))
            }),
        );
        let analyzer = analyzer(stub_server(router).await);

        let analysis = analyzer
            .analyze(&doc("d1", "python"), &[doc("d2", "Python for data")])
            .await
            .unwrap();
        assert_eq!(analysis.entities.len(), 1);
        assert_eq!(analysis.entities[0].label().as_deref(), Some("Python"));
    }

    #[tokio::test]
    async fn test_http_error_is_upstream_unavailable() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "rate limited") }),
        );
        let analyzer = analyzer(stub_server(router).await);

        let err = analyzer.analyze(&doc("d1", "x"), &[]).await.unwrap_err();
        assert!(matches!(err, Error::UpstreamUnavailable(_)));
        assert!(err.to_string().contains("429"));
    }
}
