//! Analyzer input and output types.

use serde::{Deserialize, Serialize};

/// OpenAI-compatible provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Groq,
    OpenAI,
}

impl LlmProvider {
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::OpenAI => "https://api.openai.com/v1",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::Groq => "openai/gpt-oss-20b",
            Self::OpenAI => "gpt-4o-mini",
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Groq => write!(f, "groq"),
            Self::OpenAI => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openai" => Ok(Self::OpenAI),
            other => Err(format!("unknown LLM provider: {}", other)),
        }
    }
}

/// A document handed to the analyzer, already truncated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDocument {
    pub doc_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    #[serde(default)]
    pub doc_id: String,
    #[serde(default)]
    pub text: String,
}

/// A canonical entity with its surface mentions across documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedEntity {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub mentions: Vec<Mention>,
}

impl AnalyzedEntity {
    /// First non-empty mention text, else the id.
    pub fn label(&self) -> Option<String> {
        self.mentions
            .iter()
            .map(|m| m.text.trim())
            .find(|t| !t.is_empty())
            .or_else(|| Some(self.id.trim()).filter(|id| !id.is_empty()))
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedRelation {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub relation: String,
    #[serde(default)]
    pub evidence_doc_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationAnalysis {
    #[serde(default)]
    pub entities: Vec<AnalyzedEntity>,
    #[serde(default)]
    pub relations: Vec<AnalyzedRelation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_prefers_mention_text() {
        let entity = AnalyzedEntity {
            id: "e1".into(),
            entity_type: "ORG".into(),
            mentions: vec![
                Mention {
                    doc_id: "d1".into(),
                    text: "  ".into(),
                },
                Mention {
                    doc_id: "d2".into(),
                    text: "OpenAI".into(),
                },
            ],
        };
        assert_eq!(entity.label().as_deref(), Some("OpenAI"));

        let bare = AnalyzedEntity {
            id: "e2".into(),
            ..Default::default()
        };
        assert_eq!(bare.label().as_deref(), Some("e2"));
        assert_eq!(AnalyzedEntity::default().label(), None);
    }

    #[test]
    fn test_lenient_deserialization() {
        let analysis: RelationAnalysis = serde_json::from_value(serde_json::json!({
            "entities": [{"id": "python", "mentions": [{"doc_id": "d2"}]}]
        }))
        .unwrap();
        assert_eq!(analysis.entities[0].mentions[0].text, "");
        assert!(analysis.relations.is_empty());
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("Groq".parse::<LlmProvider>(), Ok(LlmProvider::Groq));
        assert_eq!("openai".parse::<LlmProvider>(), Ok(LlmProvider::OpenAI));
        assert!("anthropic".parse::<LlmProvider>().is_err());
    }
}
