//! OpenAI provider: chat completions with JSON response format.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use dockhand_core::{Error, Result};

use crate::prompt::{build_prompt, SYSTEM_PROMPT};
use crate::{convert_to_suggestions, parse_wire_response, AnalyzeRequest, AnalyzeResponse, Provider, Usage};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// OpenAI-backed provider, configured from `OPENAI_API_KEY`.
pub struct OpenAiProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl OpenAiProvider {
    pub fn from_env() -> Self {
        let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

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
struct ChatResponse {
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: ChatUsage,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: i32,
    #[serde(default)]
    completion_tokens: i32,
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::Inference("openai provider not configured".into()))?;

        let body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": format!("{SYSTEM_PROMPT}\n\nRespond with valid JSON only."),
                },
                {"role": "user", "content": build_prompt(request)},
            ],
            "response_format": {"type": "json_object"},
            "max_tokens": request.max_tokens,
        });

        debug!(model = %self.model, document_id = %request.document_id, "calling openai");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "openai returned {status}: {text}"
            )));
        }

        let chat: ChatResponse = response.json().await?;
        let choice = chat
            .choices
            .first()
            .ok_or_else(|| Error::Inference("openai returned no choices".into()))?;

        let wire = parse_wire_response(&choice.message.content)?;

        Ok(AnalyzeResponse {
            suggestions: convert_to_suggestions(
                wire,
                &request.existing_tags,
                &request.correspondents,
            ),
            usage: Usage {
                input_tokens: chat.usage.prompt_tokens,
                output_tokens: chat.usage.completion_tokens,
                model: chat.model,
            },
        })
    }
}
