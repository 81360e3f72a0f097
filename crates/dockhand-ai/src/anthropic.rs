//! Anthropic provider: messages API with a JSON-only instruction.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use dockhand_core::{Error, Result};

use crate::prompt::{build_prompt, SYSTEM_PROMPT};
use crate::{convert_to_suggestions, parse_wire_response, AnalyzeRequest, AnalyzeResponse, Provider, Usage};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_MODEL: &str = "claude-haiku-4-5";
const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Anthropic-backed provider, configured from `ANTHROPIC_API_KEY`.
pub struct AnthropicProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl AnthropicProvider {
    pub fn from_env() -> Self {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());
        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model =
            std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("failed to build HTTP client"),
            api_key,
            base_url,
            model,
        }
    }
}

#[derive(Deserialize)]
struct MessageResponse {
    model: String,
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: MessageUsage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct MessageUsage {
    #[serde(default)]
    input_tokens: i32,
    #[serde(default)]
    output_tokens: i32,
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::Inference("anthropic provider not configured".into()))?;

        let full_prompt = format!(
            "{SYSTEM_PROMPT}\n\nRespond with valid JSON only, no markdown code blocks.\n\n{}",
            build_prompt(request)
        );

        let body = json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "messages": [{"role": "user", "content": full_prompt}],
        });

        debug!(model = %self.model, document_id = %request.document_id, "calling anthropic");

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "anthropic returned {status}: {text}"
            )));
        }

        let message: MessageResponse = response.json().await?;
        let text = message
            .content
            .iter()
            .find(|block| block.block_type == "text")
            .map(|block| block.text.as_str())
            .ok_or_else(|| Error::Inference("anthropic returned no text content".into()))?;

        let wire = parse_wire_response(text)?;

        Ok(AnalyzeResponse {
            suggestions: convert_to_suggestions(
                wire,
                &request.existing_tags,
                &request.correspondents,
            ),
            usage: Usage {
                input_tokens: message.usage.input_tokens,
                output_tokens: message.usage.output_tokens,
                model: message.model,
            },
        })
    }
}
