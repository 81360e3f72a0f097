//! Ollama provider: local inference server via the generate API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use dockhand_core::{Error, Result};

use crate::prompt::{build_prompt, SYSTEM_PROMPT};
use crate::{convert_to_suggestions, parse_wire_response, AnalyzeRequest, AnalyzeResponse, Provider, Usage};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_MODEL: &str = "llama3.2";
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Local Ollama provider.
///
/// Always reports available; connection failures surface at call time and
/// flow into the normal fallback chain.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("failed to build HTTP client"),
            base_url,
            model,
        }
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    prompt_eval_count: i32,
    #[serde(default)]
    eval_count: i32,
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn available(&self) -> bool {
        true
    }

    async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse> {
        let full_prompt = format!(
            "{SYSTEM_PROMPT}\n\n{}\n\nRespond with valid JSON only.",
            build_prompt(request)
        );

        let body = json!({
            "model": self.model,
            "prompt": full_prompt,
            "format": "json",
            "stream": false,
            "options": {"temperature": 0.1},
        });

        debug!(model = %self.model, document_id = %request.document_id, "calling ollama");

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "ollama returned {status}: {text}"
            )));
        }

        let generated: GenerateResponse = response.json().await?;
        let wire = parse_wire_response(&generated.response)?;

        Ok(AnalyzeResponse {
            suggestions: convert_to_suggestions(
                wire,
                &request.existing_tags,
                &request.correspondents,
            ),
            usage: Usage {
                input_tokens: generated.prompt_eval_count,
                output_tokens: generated.eval_count,
                model: self.model.clone(),
            },
        })
    }
}
