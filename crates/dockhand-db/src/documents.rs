//! Document repository.

use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::warn;
use uuid::Uuid;

use dockhand_core::{Document, DocumentEvent, Error, ProcessingStatus, Result};

const DOCUMENT_COLUMNS: &str = "id, original_filename, content_hash, file_size, \
     processing_status, text_content, thumbnail_generated, processing_error, \
     correspondent_id, created_at, processed_at";

/// PostgreSQL document repository.
#[derive(Clone)]
pub struct PgDocumentRepository {
    pool: PgPool,
}

impl PgDocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_row(row: PgRow) -> Document {
        Document {
            id: row.get("id"),
            original_filename: row.get("original_filename"),
            content_hash: row.get("content_hash"),
            file_size: row.get("file_size"),
            processing_status: ProcessingStatus::parse_str(
                row.get::<String, _>("processing_status").as_str(),
            ),
            text_content: row.get("text_content"),
            thumbnail_generated: row.get("thumbnail_generated"),
            processing_error: row.get("processing_error"),
            correspondent_id: row.get("correspondent_id"),
            created_at: row.get("created_at"),
            processed_at: row.get("processed_at"),
        }
    }

    /// Insert a new pending document inside a caller-owned transaction.
    pub async fn insert_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        original_filename: &str,
        content_hash: &str,
        file_size: i64,
    ) -> Result<Document> {
        let row = sqlx::query(&format!(
            "INSERT INTO documents (id, original_filename, content_hash, file_size)
             VALUES ($1, $2, $3, $4)
             RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(original_filename)
        .bind(content_hash)
        .bind(file_size)
        .fetch_one(&mut **tx)
        .await?;

        Ok(Self::parse_row(row))
    }

    pub async fn get(&self, id: Uuid) -> Result<Document> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::parse_row).ok_or(Error::DocumentNotFound(id))
    }

    /// Look up a document by content hash; the dedupe probe.
    pub async fn get_by_hash(&self, content_hash: &str) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE content_hash = $1"
        ))
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::parse_row))
    }

    pub async fn set_processing_status(&self, id: Uuid, status: ProcessingStatus) -> Result<()> {
        sqlx::query("UPDATE documents SET processing_status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record successful processing: text, thumbnail flag, completed status,
    /// and `processed_at` in one statement, inside the caller's transaction.
    pub async fn complete_processing_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        text_content: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE documents
             SET text_content = $1, thumbnail_generated = TRUE,
                 processing_status = 'completed', processing_error = NULL,
                 processed_at = $2
             WHERE id = $3",
        )
        .bind(text_content)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Terminal failed disposition after exhausted retries.
    pub async fn quarantine(&self, id: Uuid, reason: &str) -> Result<()> {
        sqlx::query(
            "UPDATE documents
             SET processing_status = 'failed', processing_error = $1, processed_at = $2
             WHERE id = $3",
        )
        .bind(reason)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Admin retry: put a failed document back to pending.
    pub async fn reset_for_retry(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE documents
             SET processing_status = 'pending', processing_error = NULL, processed_at = NULL
             WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Append an audit event inside a caller-owned transaction.
    pub async fn insert_event_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
        event_type: &str,
        payload: Option<&JsonValue>,
        error_message: Option<&str>,
        duration_ms: Option<i32>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO document_events (document_id, event_type, payload, error_message, duration_ms)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(document_id)
        .bind(event_type)
        .bind(payload)
        .bind(error_message)
        .bind(duration_ms)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Append an audit event outside any transaction. Failures are logged,
    /// not propagated: events are best-effort, document state is
    /// authoritative.
    pub async fn log_event(
        &self,
        document_id: Uuid,
        event_type: &str,
        payload: Option<&JsonValue>,
        error_message: Option<&str>,
        duration_ms: Option<i32>,
    ) {
        let result = sqlx::query(
            "INSERT INTO document_events (document_id, event_type, payload, error_message, duration_ms)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(document_id)
        .bind(event_type)
        .bind(payload)
        .bind(error_message)
        .bind(duration_ms)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(document_id = %document_id, event_type, error = %e, "failed to log document event");
        }
    }

    /// All events for a document, in committed order.
    pub async fn list_events(&self, document_id: Uuid) -> Result<Vec<DocumentEvent>> {
        let rows = sqlx::query(
            "SELECT id, document_id, event_type, payload, error_message, duration_ms, created_at
             FROM document_events
             WHERE document_id = $1
             ORDER BY id",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| DocumentEvent {
                id: row.get("id"),
                document_id: row.get("document_id"),
                event_type: row.get("event_type"),
                payload: row.get("payload"),
                error_message: row.get("error_message"),
                duration_ms: row.get("duration_ms"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
