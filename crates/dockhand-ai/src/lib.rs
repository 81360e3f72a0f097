//! # dockhand-ai
//!
//! Provider-agnostic AI document analysis. Each provider coerces its native
//! response format into one JSON schema (tag suggestions plus an optional
//! correspondent); the service layer picks a provider, falls back across the
//! rest on failure, and resolves suggestions against the configured
//! confidence thresholds.

pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod prompt;
pub mod service;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use service::{AiService, AnalyzeOutcome};

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use dockhand_core::defaults::AI_MAX_TOKENS;
use dockhand_core::{Result, SuggestionType};

/// Document content and taxonomy context sent to a provider.
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub document_id: Uuid,
    /// Truncated extracted text (first pages).
    pub text_content: String,
    /// Current tag taxonomy, so providers prefer existing names.
    pub existing_tags: Vec<String>,
    /// Current correspondents.
    pub correspondents: Vec<String>,
    pub max_tokens: u32,
}

impl AnalyzeRequest {
    pub fn new(document_id: Uuid, text_content: String) -> Self {
        Self {
            document_id,
            text_content,
            existing_tags: Vec::new(),
            correspondents: Vec::new(),
            max_tokens: AI_MAX_TOKENS,
        }
    }
}

/// One candidate association produced by a provider.
#[derive(Debug, Clone)]
pub struct Suggestion {
    pub suggestion_type: SuggestionType,
    pub value: String,
    pub confidence: f64,
    pub reasoning: String,
    /// Whether the name was absent from the existing taxonomy.
    pub is_new: bool,
}

/// Token accounting for one provider call.
#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub input_tokens: i32,
    pub output_tokens: i32,
    pub model: String,
}

/// Normalized provider output.
#[derive(Debug, Clone)]
pub struct AnalyzeResponse {
    pub suggestions: Vec<Suggestion>,
    pub usage: Usage,
}

/// The JSON schema every provider must coerce its answer into.
#[derive(Debug, Clone, Deserialize)]
pub struct WireResponse {
    #[serde(default)]
    pub tags: Vec<WireTag>,
    #[serde(default)]
    pub correspondent: Option<WireCorrespondent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireTag {
    pub name: String,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireCorrespondent {
    pub name: String,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// An AI provider backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider identifier: `openai`, `anthropic`, `ollama`.
    fn name(&self) -> &'static str;

    /// Whether the provider is configured (credentials/env present).
    fn available(&self) -> bool;

    /// Analyze document text and return suggestions.
    async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse>;
}

/// Convert a wire response into suggestions, marking names that are not in
/// the existing taxonomy as new.
pub fn convert_to_suggestions(
    response: WireResponse,
    existing_tags: &[String],
    existing_correspondents: &[String],
) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();

    for tag in response.tags {
        let is_new = !existing_tags.iter().any(|t| t == &tag.name);
        suggestions.push(Suggestion {
            suggestion_type: SuggestionType::Tag,
            value: tag.name,
            confidence: tag.confidence,
            reasoning: tag.reasoning,
            is_new,
        });
    }

    if let Some(correspondent) = response.correspondent {
        let is_new = !existing_correspondents
            .iter()
            .any(|c| c == &correspondent.name);
        suggestions.push(Suggestion {
            suggestion_type: SuggestionType::Correspondent,
            value: correspondent.name,
            confidence: correspondent.confidence,
            reasoning: correspondent.reasoning,
            is_new,
        });
    }

    suggestions
}

/// Parse a provider's raw JSON answer into the wire schema.
pub fn parse_wire_response(raw: &str) -> Result<WireResponse> {
    serde_json::from_str(raw).map_err(|e| {
        dockhand_core::Error::Inference(format!("provider returned invalid JSON: {e} (raw: {raw})"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wire_response_full() {
        let raw = r#"{
            "tags": [
                {"name": "invoice", "confidence": 0.95, "reasoning": "totals and due date"},
                {"name": "utilities", "confidence": 0.6, "reasoning": "power company"}
            ],
            "correspondent": {"name": "Acme Power", "confidence": 0.9, "reasoning": "letterhead"}
        }"#;

        let parsed = parse_wire_response(raw).unwrap();
        assert_eq!(parsed.tags.len(), 2);
        assert_eq!(parsed.tags[0].name, "invoice");
        assert_eq!(parsed.correspondent.as_ref().unwrap().name, "Acme Power");
    }

    #[test]
    fn test_parse_wire_response_null_correspondent() {
        let raw = r#"{"tags": [], "correspondent": null}"#;
        let parsed = parse_wire_response(raw).unwrap();
        assert!(parsed.tags.is_empty());
        assert!(parsed.correspondent.is_none());
    }

    #[test]
    fn test_parse_wire_response_missing_fields_default() {
        let parsed = parse_wire_response("{}").unwrap();
        assert!(parsed.tags.is_empty());
        assert!(parsed.correspondent.is_none());
    }

    #[test]
    fn test_parse_wire_response_invalid_json() {
        assert!(parse_wire_response("not json").is_err());
    }

    #[test]
    fn test_convert_marks_new_names() {
        let response = WireResponse {
            tags: vec![
                WireTag {
                    name: "invoice".into(),
                    confidence: 0.9,
                    reasoning: String::new(),
                },
                WireTag {
                    name: "brand-new".into(),
                    confidence: 0.7,
                    reasoning: String::new(),
                },
            ],
            correspondent: Some(WireCorrespondent {
                name: "Acme".into(),
                confidence: 0.8,
                reasoning: String::new(),
            }),
        };

        let suggestions = convert_to_suggestions(
            response,
            &["invoice".to_string()],
            &["Globex".to_string()],
        );

        assert_eq!(suggestions.len(), 3);
        assert!(!suggestions[0].is_new);
        assert!(suggestions[1].is_new);
        assert!(suggestions[2].is_new);
        assert_eq!(suggestions[2].suggestion_type, SuggestionType::Correspondent);
    }

    #[test]
    fn test_convert_without_correspondent() {
        let response = WireResponse {
            tags: vec![WireTag {
                name: "receipt".into(),
                confidence: 0.5,
                reasoning: String::new(),
            }],
            correspondent: None,
        };

        let suggestions = convert_to_suggestions(response, &[], &[]);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].suggestion_type, SuggestionType::Tag);
    }
}
