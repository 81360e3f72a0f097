//! AI settings, suggestions, and usage repositories.

use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::warn;
use uuid::Uuid;

use dockhand_core::{
    AiSettings, AiSuggestion, Error, Result, SuggestionStatus, SuggestionType,
};

const SUGGESTION_COLUMNS: &str = "id, document_id, job_id, suggestion_type, value, confidence, \
     reasoning, is_new, status, resolved_at, resolved_by, created_at";

/// Fields for inserting a suggestion row.
#[derive(Debug, Clone)]
pub struct NewSuggestion {
    pub document_id: Uuid,
    pub job_id: Option<Uuid>,
    pub suggestion_type: SuggestionType,
    pub value: String,
    pub confidence: f64,
    pub reasoning: Option<String>,
    pub is_new: bool,
    pub status: SuggestionStatus,
    pub resolved_by: Option<String>,
}

/// PostgreSQL AI repository (settings singleton, suggestions, usage log).
#[derive(Clone)]
pub struct PgAiRepository {
    pool: PgPool,
}

impl PgAiRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_suggestion(row: PgRow) -> AiSuggestion {
        AiSuggestion {
            id: row.get("id"),
            document_id: row.get("document_id"),
            job_id: row.get("job_id"),
            suggestion_type: SuggestionType::parse_str(
                row.get::<String, _>("suggestion_type").as_str(),
            ),
            value: row.get("value"),
            confidence: row.get("confidence"),
            reasoning: row.get("reasoning"),
            is_new: row.get("is_new"),
            status: SuggestionStatus::parse_str(row.get::<String, _>("status").as_str()),
            resolved_at: row.get("resolved_at"),
            resolved_by: row.get("resolved_by"),
            created_at: row.get("created_at"),
        }
    }

    /// Load the settings singleton.
    pub async fn get_settings(&self) -> Result<AiSettings> {
        let row = sqlx::query(
            "SELECT preferred_provider, max_pages, auto_process, auto_apply_threshold,
                    review_threshold, min_word_count
             FROM ai_settings",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AiSettings {
            preferred_provider: row.get("preferred_provider"),
            max_pages: row.get("max_pages"),
            auto_process: row.get("auto_process"),
            auto_apply_threshold: row.get("auto_apply_threshold"),
            review_threshold: row.get("review_threshold"),
            min_word_count: row.get("min_word_count"),
        })
    }

    pub async fn update_settings(&self, settings: &AiSettings) -> Result<()> {
        sqlx::query(
            "UPDATE ai_settings
             SET preferred_provider = $1, max_pages = $2, auto_process = $3,
                 auto_apply_threshold = $4, review_threshold = $5, min_word_count = $6",
        )
        .bind(&settings.preferred_provider)
        .bind(settings.max_pages)
        .bind(settings.auto_process)
        .bind(settings.auto_apply_threshold)
        .bind(settings.review_threshold)
        .bind(settings.min_word_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a suggestion row inside the caller's transaction (auto-apply).
    pub async fn insert_suggestion_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        suggestion: &NewSuggestion,
    ) -> Result<AiSuggestion> {
        let resolved_at = match suggestion.status {
            SuggestionStatus::Pending => None,
            _ => Some(Utc::now()),
        };

        let row = sqlx::query(&format!(
            "INSERT INTO ai_suggestions
                 (id, document_id, job_id, suggestion_type, value, confidence, reasoning,
                  is_new, status, resolved_at, resolved_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {SUGGESTION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(suggestion.document_id)
        .bind(suggestion.job_id)
        .bind(suggestion.suggestion_type.as_str())
        .bind(&suggestion.value)
        .bind(suggestion.confidence)
        .bind(&suggestion.reasoning)
        .bind(suggestion.is_new)
        .bind(suggestion.status.as_str())
        .bind(resolved_at)
        .bind(&suggestion.resolved_by)
        .fetch_one(&mut **tx)
        .await?;

        Ok(Self::parse_suggestion(row))
    }

    /// Insert a pending suggestion outside any transaction.
    pub async fn insert_suggestion(&self, suggestion: &NewSuggestion) -> Result<AiSuggestion> {
        let mut tx = self.pool.begin().await?;
        let created = self.insert_suggestion_in_tx(&mut tx, suggestion).await?;
        tx.commit().await?;
        Ok(created)
    }

    pub async fn get_suggestion(&self, id: Uuid) -> Result<AiSuggestion> {
        let row = sqlx::query(&format!(
            "SELECT {SUGGESTION_COLUMNS} FROM ai_suggestions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::parse_suggestion)
            .ok_or_else(|| Error::NotFound(format!("suggestion {id}")))
    }

    pub async fn list_suggestions(
        &self,
        document_id: Uuid,
        status: Option<SuggestionStatus>,
    ) -> Result<Vec<AiSuggestion>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {SUGGESTION_COLUMNS} FROM ai_suggestions
                     WHERE document_id = $1 AND status = $2
                     ORDER BY created_at"
                ))
                .bind(document_id)
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {SUGGESTION_COLUMNS} FROM ai_suggestions
                     WHERE document_id = $1
                     ORDER BY created_at"
                ))
                .bind(document_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(Self::parse_suggestion).collect())
    }

    /// Drop a document's pending suggestions before re-analysis.
    pub async fn delete_pending_suggestions(&self, document_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM ai_suggestions WHERE document_id = $1 AND status = 'pending'",
        )
        .bind(document_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Accept or reject a pending suggestion.
    pub async fn resolve_suggestion(
        &self,
        id: Uuid,
        status: SuggestionStatus,
        resolved_by: &str,
    ) -> Result<AiSuggestion> {
        let row = sqlx::query(&format!(
            "UPDATE ai_suggestions
             SET status = $1, resolved_at = $2, resolved_by = $3
             WHERE id = $4 AND status = 'pending'
             RETURNING {SUGGESTION_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(resolved_by)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::parse_suggestion)
            .ok_or_else(|| Error::NotFound(format!("pending suggestion {id}")))
    }

    /// Record provider token usage per call. Best-effort.
    pub async fn log_usage(
        &self,
        document_id: Uuid,
        job_id: Option<Uuid>,
        provider: &str,
        model: &str,
        input_tokens: i32,
        output_tokens: i32,
    ) {
        let result = sqlx::query(
            "INSERT INTO ai_usage (document_id, job_id, provider, model, input_tokens, output_tokens)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(document_id)
        .bind(job_id)
        .bind(provider)
        .bind(model)
        .bind(input_tokens)
        .bind(output_tokens)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(document_id = %document_id, provider, error = %e, "failed to record AI usage");
        }
    }
}
