//! AI analysis job handler for the `ai` queue.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use dockhand_core::defaults::{JOB_TYPE_AI, QUEUE_AI};
use dockhand_core::status::stages;
use dockhand_core::{DocumentJobPayload, Error, Job, Result, StatusBroadcaster, StatusUpdate};
use dockhand_ai::AiService;

use crate::handler::{JobContext, JobHandler};

/// Handler running provider analysis for one document.
pub struct AiAnalyzeHandler {
    ai: Arc<AiService>,
    broadcaster: StatusBroadcaster,
}

impl AiAnalyzeHandler {
    pub fn new(ai: Arc<AiService>, broadcaster: StatusBroadcaster) -> Self {
        Self { ai, broadcaster }
    }
}

#[async_trait]
impl JobHandler for AiAnalyzeHandler {
    fn job_type(&self) -> &'static str {
        JOB_TYPE_AI
    }

    async fn execute(&self, _ctx: &JobContext, job: &Job) -> Result<()> {
        let payload: DocumentJobPayload = serde_json::from_value(job.payload.clone())?;
        let document_id = payload.document_id;

        info!(
            document_id = %document_id,
            job_id = %job.id,
            attempt = job.attempt,
            "starting AI analysis"
        );

        self.broadcaster
            .broadcast(StatusUpdate::new(document_id, stages::AI_PROCESSING, QUEUE_AI));

        match self.ai.analyze_document(document_id, Some(job.id)).await {
            Ok(outcome) => {
                info!(
                    document_id = %document_id,
                    job_id = %job.id,
                    provider = %outcome.provider,
                    auto_applied = outcome.auto_applied,
                    pending = outcome.pending,
                    skipped = outcome.skipped,
                    duration_ms = outcome.duration_ms,
                    "AI analysis complete"
                );

                self.broadcaster
                    .broadcast(StatusUpdate::new(document_id, stages::AI_COMPLETE, QUEUE_AI));
                Ok(())
            }
            Err(e) => {
                error!(document_id = %document_id, job_id = %job.id, error = %e, "AI analysis failed");

                self.broadcaster.broadcast(
                    StatusUpdate::new(document_id, stages::AI_FAILED, QUEUE_AI)
                        .with_error(e.to_string()),
                );

                Err(Error::Job(format!("analyze document: {e}")))
            }
        }
    }
}
