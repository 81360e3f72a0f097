//! Provider selection, fallback, and suggestion resolution.

use std::sync::Arc;
use std::time::Instant;

use sqlx::{Postgres, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use dockhand_core::defaults::CHARS_PER_PAGE;
use dockhand_core::{AiSettings, Error, Result, SuggestionStatus, SuggestionType};
use dockhand_db::{Database, NewSuggestion};

use crate::{
    AnalyzeRequest, AnalyzeResponse, AnthropicProvider, OllamaProvider, OpenAiProvider, Provider,
    Suggestion,
};

/// How a suggestion's confidence routes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    AutoApply,
    Review,
    Skip,
}

/// Route a confidence score against the configured thresholds.
pub fn route_suggestion(confidence: f64, settings: &AiSettings) -> Route {
    if confidence >= settings.auto_apply_threshold {
        Route::AutoApply
    } else if confidence >= settings.review_threshold {
        Route::Review
    } else {
        Route::Skip
    }
}

/// Counters summarizing one document analysis.
#[derive(Debug, Clone)]
pub struct AnalyzeOutcome {
    pub auto_applied: usize,
    pub pending: usize,
    pub skipped: usize,
    pub provider: String,
    pub duration_ms: u64,
}

/// Orchestrates AI providers and persists suggestions.
pub struct AiService {
    db: Database,
    providers: Vec<Arc<dyn Provider>>,
}

impl AiService {
    /// Create the service with the standard provider set, in priority order.
    pub fn new(db: Database) -> Self {
        let providers: Vec<Arc<dyn Provider>> = vec![
            Arc::new(OpenAiProvider::from_env()),
            Arc::new(AnthropicProvider::from_env()),
            Arc::new(OllamaProvider::from_env()),
        ];

        for provider in &providers {
            if provider.available() {
                info!(provider = provider.name(), "AI provider available");
            }
        }

        Self { db, providers }
    }

    /// Create the service with an explicit provider list (tests).
    pub fn with_providers(db: Database, providers: Vec<Arc<dyn Provider>>) -> Self {
        Self { db, providers }
    }

    /// Analyze a document's extracted text and store the suggestions.
    pub async fn analyze_document(
        &self,
        document_id: Uuid,
        job_id: Option<Uuid>,
    ) -> Result<AnalyzeOutcome> {
        let start = Instant::now();

        let settings = self.db.ai.get_settings().await?;
        let document = self.db.documents.get(document_id).await?;

        let text = document
            .text_content
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::InvalidInput("document has no text content".into()))?;

        let existing_tags = self.db.taxonomy.list_tag_names().await?;
        let correspondents = self.db.taxonomy.list_correspondent_names().await?;

        // Truncate to the configured page cap.
        let max_chars = settings.max_pages.max(0) as usize * CHARS_PER_PAGE;
        let text_content = if text.len() > max_chars {
            let mut cut = max_chars;
            while cut > 0 && !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text[..cut].to_string()
        } else {
            text
        };

        let mut request = AnalyzeRequest::new(document_id, text_content);
        request.existing_tags = existing_tags;
        request.correspondents = correspondents;

        let provider = self.select_provider(settings.preferred_provider.as_deref())?;
        info!(
            document_id = %document_id,
            provider = provider.name(),
            text_length = request.text_content.len(),
            "analyzing document"
        );

        let (response, provider) = match provider.analyze(&request).await {
            Ok(response) => (response, provider),
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "provider failed, trying fallbacks");
                self.try_fallback_providers(&request, provider.name()).await?
            }
        };

        self.db
            .ai
            .log_usage(
                document_id,
                job_id,
                provider.name(),
                &response.usage.model,
                response.usage.input_tokens,
                response.usage.output_tokens,
            )
            .await;

        let mut outcome = AnalyzeOutcome {
            auto_applied: 0,
            pending: 0,
            skipped: 0,
            provider: provider.name().to_string(),
            duration_ms: 0,
        };

        for suggestion in &response.suggestions {
            match route_suggestion(suggestion.confidence, &settings) {
                Route::AutoApply => {
                    match self.auto_apply(document_id, job_id, suggestion).await {
                        Ok(()) => outcome.auto_applied += 1,
                        Err(e) => warn!(
                            document_id = %document_id,
                            value = %suggestion.value,
                            error = %e,
                            "failed to auto-apply suggestion"
                        ),
                    }
                }
                Route::Review => {
                    let pending = NewSuggestion {
                        document_id,
                        job_id,
                        suggestion_type: suggestion.suggestion_type,
                        value: suggestion.value.clone(),
                        confidence: suggestion.confidence,
                        reasoning: Some(suggestion.reasoning.clone()),
                        is_new: suggestion.is_new,
                        status: SuggestionStatus::Pending,
                        resolved_by: None,
                    };
                    match self.db.ai.insert_suggestion(&pending).await {
                        Ok(_) => outcome.pending += 1,
                        Err(e) => warn!(
                            document_id = %document_id,
                            value = %suggestion.value,
                            error = %e,
                            "failed to store pending suggestion"
                        ),
                    }
                }
                Route::Skip => {
                    outcome.skipped += 1;
                    debug!(
                        document_id = %document_id,
                        value = %suggestion.value,
                        confidence = suggestion.confidence,
                        "skipping low-confidence suggestion"
                    );
                }
            }
        }

        outcome.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            document_id = %document_id,
            provider = %outcome.provider,
            auto_applied = outcome.auto_applied,
            pending = outcome.pending,
            skipped = outcome.skipped,
            duration_ms = outcome.duration_ms,
            "document analysis complete"
        );

        Ok(outcome)
    }

    /// Preferred provider if configured and available, else first available.
    fn select_provider(&self, preferred: Option<&str>) -> Result<Arc<dyn Provider>> {
        if let Some(name) = preferred.filter(|n| !n.is_empty()) {
            if let Some(provider) = self
                .providers
                .iter()
                .find(|p| p.name() == name && p.available())
            {
                return Ok(provider.clone());
            }
        }

        self.providers
            .iter()
            .find(|p| p.available())
            .cloned()
            .ok_or_else(|| Error::Inference("no AI providers available".into()))
    }

    /// Try the remaining available providers in order after a failure.
    async fn try_fallback_providers(
        &self,
        request: &AnalyzeRequest,
        failed: &str,
    ) -> Result<(AnalyzeResponse, Arc<dyn Provider>)> {
        let mut last_error = None;

        for provider in &self.providers {
            if provider.name() == failed || !provider.available() {
                continue;
            }

            info!(provider = provider.name(), "trying fallback AI provider");
            match provider.analyze(request).await {
                Ok(response) => return Ok((response, provider.clone())),
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "fallback provider failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| Error::Inference("all providers failed".into())))
    }

    /// Persist a high-confidence suggestion and apply the association, both
    /// inside one transaction.
    async fn auto_apply(
        &self,
        document_id: Uuid,
        job_id: Option<Uuid>,
        suggestion: &Suggestion,
    ) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;

        let record = NewSuggestion {
            document_id,
            job_id,
            suggestion_type: suggestion.suggestion_type,
            value: suggestion.value.clone(),
            confidence: suggestion.confidence,
            reasoning: Some(suggestion.reasoning.clone()),
            is_new: suggestion.is_new,
            status: SuggestionStatus::AutoApplied,
            resolved_by: Some("auto".to_string()),
        };
        let created = self.db.ai.insert_suggestion_in_tx(&mut tx, &record).await?;

        self.apply_association(&mut tx, document_id, suggestion.suggestion_type, &suggestion.value)
            .await?;

        tx.commit().await?;

        info!(
            suggestion_id = %created.id,
            value = %suggestion.value,
            confidence = suggestion.confidence,
            "auto-applied AI suggestion"
        );

        Ok(())
    }

    /// Apply a reviewer-accepted suggestion's association to its document.
    pub async fn apply_suggestion_manual(
        &self,
        document_id: Uuid,
        suggestion_type: SuggestionType,
        value: &str,
    ) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;
        self.apply_association(&mut tx, document_id, suggestion_type, value)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Find-or-create the tag/correspondent by exact name and link it.
    async fn apply_association(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
        suggestion_type: SuggestionType,
        value: &str,
    ) -> Result<()> {
        match suggestion_type {
            SuggestionType::Tag => {
                let tag = match self.db.taxonomy.find_tag_in_tx(tx, value).await? {
                    Some(tag) => tag,
                    None => {
                        let tag = self.db.taxonomy.create_tag_in_tx(tx, value).await?;
                        info!(tag_id = %tag.id, name = %tag.name, "created tag from AI suggestion");
                        tag
                    }
                };
                self.db.taxonomy.link_tag_in_tx(tx, document_id, tag.id).await?;
            }
            SuggestionType::Correspondent => {
                let correspondent =
                    match self.db.taxonomy.find_correspondent_in_tx(tx, value).await? {
                        Some(correspondent) => correspondent,
                        None => {
                            let correspondent =
                                self.db.taxonomy.create_correspondent_in_tx(tx, value).await?;
                            info!(
                                correspondent_id = %correspondent.id,
                                name = %correspondent.name,
                                "created correspondent from AI suggestion"
                            );
                            correspondent
                        }
                    };
                self.db
                    .taxonomy
                    .set_document_correspondent_in_tx(tx, document_id, correspondent.id)
                    .await?;
            }
        }
        Ok(())
    }

    /// True when at least one provider is usable.
    pub fn any_provider_available(&self) -> bool {
        self.providers.iter().any(|p| p.available())
    }

    /// Names of usable providers, in priority order.
    pub fn available_providers(&self) -> Vec<&'static str> {
        self.providers
            .iter()
            .filter(|p| p.available())
            .map(|p| p.name())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AiSettings {
        AiSettings {
            auto_apply_threshold: 0.85,
            review_threshold: 0.5,
            ..AiSettings::default()
        }
    }

    #[test]
    fn test_route_auto_apply_at_threshold() {
        assert_eq!(route_suggestion(0.85, &settings()), Route::AutoApply);
        assert_eq!(route_suggestion(0.99, &settings()), Route::AutoApply);
    }

    #[test]
    fn test_route_review_band() {
        assert_eq!(route_suggestion(0.5, &settings()), Route::Review);
        assert_eq!(route_suggestion(0.84, &settings()), Route::Review);
    }

    #[test]
    fn test_route_skip_below_review() {
        assert_eq!(route_suggestion(0.49, &settings()), Route::Skip);
        assert_eq!(route_suggestion(0.0, &settings()), Route::Skip);
    }
}
