//! Processing orchestrator: the `process_document` job handler.
//!
//! Text extraction and thumbnail rendering must both succeed before the
//! document transitions to completed; the final commit is all-or-nothing.
//! A failure on the last delivery attempt quarantines the document instead
//! of retrying, because retrying an exhausted job cannot help.

use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use dockhand_core::defaults::{JOB_TYPE_AI, JOB_TYPE_PROCESS, QUEUE_AI, QUEUE_DEFAULT};
use dockhand_core::models::event_types;
use dockhand_core::status::stages;
use dockhand_core::{
    DocumentJobPayload, Error, Job, ProcessingStatus, Result, StatusBroadcaster, StatusUpdate,
};
use dockhand_db::Database;
use dockhand_ingest::DocumentService;

use crate::handler::{JobContext, JobHandler};
use crate::handlers::text::TextExtractor;
use crate::handlers::thumbnail::ThumbnailGenerator;

/// Handler driving a document through `processing → completed | failed`.
pub struct ProcessHandler {
    db: Database,
    documents: DocumentService,
    text: TextExtractor,
    thumbnails: ThumbnailGenerator,
    broadcaster: StatusBroadcaster,
}

impl ProcessHandler {
    pub fn new(
        db: Database,
        documents: DocumentService,
        text: TextExtractor,
        thumbnails: ThumbnailGenerator,
        broadcaster: StatusBroadcaster,
    ) -> Self {
        Self {
            db,
            documents,
            text,
            thumbnails,
            broadcaster,
        }
    }

    /// Terminal failed disposition: record the reason, audit it, tell
    /// subscribers, and report the job as handled.
    async fn quarantine(&self, document_id: Uuid, reason: String) -> Result<()> {
        warn!(document_id = %document_id, reason = %reason, "quarantining document");

        self.db.documents.quarantine(document_id, &reason).await?;
        self.db
            .documents
            .log_event(
                document_id,
                event_types::QUARANTINED,
                Some(&json!({"reason": reason})),
                Some(&reason),
                None,
            )
            .await;

        self.broadcaster.broadcast(
            StatusUpdate::new(document_id, stages::FAILED, QUEUE_DEFAULT).with_error(reason),
        );

        Ok(())
    }
}

#[async_trait]
impl JobHandler for ProcessHandler {
    fn job_type(&self) -> &'static str {
        JOB_TYPE_PROCESS
    }

    async fn execute(&self, ctx: &JobContext, job: &Job) -> Result<()> {
        let payload: DocumentJobPayload = serde_json::from_value(job.payload.clone())?;
        let document_id = payload.document_id;
        let start = Instant::now();

        info!(
            document_id = %document_id,
            job_id = %job.id,
            attempt = job.attempt,
            "processing document"
        );

        let document = self.db.documents.get(document_id).await?;

        self.db
            .documents
            .set_processing_status(document_id, ProcessingStatus::Processing)
            .await?;
        self.broadcaster
            .broadcast(StatusUpdate::new(document_id, stages::PROCESSING, QUEUE_DEFAULT));

        let pdf_path = self.documents.original_path(&document);

        // Settings are read once, up front; the value seen here governs the
        // word-count check for this document.
        let settings = match self.db.ai.get_settings().await {
            Ok(settings) => Some(settings),
            Err(e) => {
                warn!(error = %e, "failed to load ai settings, skipping word count check");
                None
            }
        };

        let text_start = Instant::now();
        let (text, method) = match self.text.extract(&ctx.cancel, &pdf_path).await {
            Ok(extracted) => extracted,
            Err(e @ Error::Canceled(_)) => return Err(e),
            Err(e) => {
                if job.attempt >= job.max_attempts {
                    return self
                        .quarantine(document_id, format!("text extraction failed: {e}"))
                        .await;
                }
                return Err(Error::Job(format!("extract text: {e}")));
            }
        };
        let text_duration = text_start.elapsed();

        info!(
            document_id = %document_id,
            method = method.as_str(),
            length = text.len(),
            duration_ms = text_duration.as_millis() as u64,
            "text extracted"
        );

        if let Some(settings) = &settings {
            if settings.min_word_count > 0 {
                let word_count = text.split_whitespace().count();
                if word_count < settings.min_word_count as usize {
                    return self
                        .quarantine(
                            document_id,
                            format!(
                                "document has {word_count} words (minimum required: {})",
                                settings.min_word_count
                            ),
                        )
                        .await;
                }
            }
        }

        let thumb_start = Instant::now();
        let thumb_path = match self
            .thumbnails
            .generate(&ctx.cancel, &pdf_path, document_id)
            .await
        {
            Ok(path) => path,
            Err(e @ Error::Canceled(_)) => return Err(e),
            Err(e) => {
                if job.attempt >= job.max_attempts {
                    return self
                        .quarantine(document_id, format!("thumbnail generation failed: {e}"))
                        .await;
                }
                return Err(Error::Job(format!("generate thumbnail: {e}")));
            }
        };
        let thumb_duration = thumb_start.elapsed();

        // All-or-nothing: the document either fully completes with all
        // artifacts recorded, or stays in processing and the job retries.
        let mut tx = self.db.pool().begin().await?;
        self.db
            .documents
            .complete_processing_in_tx(&mut tx, document_id, &text)
            .await?;
        self.db
            .documents
            .insert_event_in_tx(
                &mut tx,
                document_id,
                event_types::PROCESSING_COMPLETE,
                Some(&json!({
                    "text_length": text.len(),
                    "text_method": method.as_str(),
                    "text_duration_ms": text_duration.as_millis() as u64,
                    "thumb_path": thumb_path.display().to_string(),
                    "thumb_duration_ms": thumb_duration.as_millis() as u64,
                    "total_duration_ms": start.elapsed().as_millis() as u64,
                })),
                None,
                Some(start.elapsed().as_millis() as i32),
            )
            .await?;
        tx.commit().await?;

        info!(
            document_id = %document_id,
            text_length = text.len(),
            text_method = method.as_str(),
            duration_ms = start.elapsed().as_millis() as u64,
            "document processing complete"
        );

        self.broadcaster
            .broadcast(StatusUpdate::new(document_id, stages::COMPLETED, QUEUE_DEFAULT));

        // Chain AI analysis when enabled. Enqueue failures only warn: the
        // document itself is already complete.
        if settings.map(|s| s.auto_process).unwrap_or(false) {
            let payload = json!({"document_id": document_id});
            match self.db.jobs.enqueue(QUEUE_AI, JOB_TYPE_AI, &payload, None).await {
                Ok(_) => info!(document_id = %document_id, "ai analysis queued"),
                Err(e) => warn!(document_id = %document_id, error = %e, "failed to enqueue ai analysis"),
            }
        }

        Ok(())
    }
}
