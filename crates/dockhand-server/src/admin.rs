//! Admin operations surface: job retry/dismiss/stats, source sync and
//! connection tests, AI settings, suggestion review.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use dockhand_core::defaults::{JOB_TYPE_AI, JOB_TYPE_PROCESS, QUEUE_AI, QUEUE_DEFAULT};
use dockhand_core::{AiSettings, Error, JobStatus, SuggestionStatus};

use crate::AppState;

/// Maps core errors onto HTTP statuses.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound(_) | Error::DocumentNotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Canceled(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub queue: Option<String>,
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// `GET /api/jobs`
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> ApiResult<impl IntoResponse> {
    let status = query.status.as_deref().map(JobStatus::parse_str);
    let jobs = state
        .db
        .jobs
        .list(query.queue.as_deref(), status, query.limit, query.offset)
        .await?;
    Ok(Json(jobs))
}

/// `GET /api/jobs/stats`
pub async fn job_stats(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.db.jobs.counts().await?))
}

/// `POST /api/jobs/:id/retry`
pub async fn retry_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.db.jobs.reset_for_retry(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    #[serde(default = "default_queue")]
    pub queue: String,
}

fn default_queue() -> String {
    QUEUE_DEFAULT.to_string()
}

/// `POST /api/jobs/retry-all`
pub async fn retry_all_failed(
    State(state): State<AppState>,
    Query(query): Query<QueueQuery>,
) -> ApiResult<impl IntoResponse> {
    let reset = state.db.jobs.reset_all_failed(&query.queue).await?;
    Ok(Json(json!({"reset": reset})))
}

/// `POST /api/jobs/:id/dismiss`
pub async fn dismiss_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.db.jobs.dismiss(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/documents/:id/retry`: put a failed document back through
/// the pipeline with a fresh job.
pub async fn retry_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    // 404 before mutating anything.
    state.db.documents.get(id).await?;

    state.db.documents.reset_for_retry(id).await?;
    state
        .db
        .jobs
        .enqueue(
            QUEUE_DEFAULT,
            JOB_TYPE_PROCESS,
            &json!({"document_id": id}),
            None,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/documents/:id/analyze`: re-run AI analysis, discarding any
/// pending suggestions first.
pub async fn reanalyze_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let document = state.db.documents.get(id).await?;

    if document.text_content.as_deref().unwrap_or("").is_empty() {
        return Err(Error::InvalidInput("document has no text content".into()).into());
    }

    if let Err(e) = state.db.ai.delete_pending_suggestions(id).await {
        tracing::warn!(document_id = %id, error = %e, "failed to delete existing suggestions");
    }

    state
        .db
        .jobs
        .enqueue(QUEUE_AI, JOB_TYPE_AI, &json!({"document_id": id}), None)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

/// `POST /api/sources/:id/test`
pub async fn test_source(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.network.test_connection(id).await?;
    Ok(Json(json!({"ok": true})))
}

/// `POST /api/sources/:id/sync`
pub async fn sync_source(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let imported = state.network.sync_source(&state.cancel, id).await?;
    Ok(Json(json!({"imported": imported})))
}

/// `POST /api/sources/sync-all`
pub async fn sync_all_sources(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    state.network.sync_all(&state.cancel).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/ai/settings`
pub async fn get_ai_settings(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.db.ai.get_settings().await?))
}

/// `PUT /api/ai/settings`
pub async fn update_ai_settings(
    State(state): State<AppState>,
    Json(settings): Json<AiSettings>,
) -> ApiResult<impl IntoResponse> {
    state.db.ai.update_settings(&settings).await?;
    Ok(Json(settings))
}

/// `POST /api/suggestions/:id/accept`: apply the association, then mark
/// the suggestion accepted.
pub async fn accept_suggestion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let suggestion = state.db.ai.get_suggestion(id).await?;

    state
        .ai
        .apply_suggestion_manual(
            suggestion.document_id,
            suggestion.suggestion_type,
            &suggestion.value,
        )
        .await?;

    let resolved = state
        .db
        .ai
        .resolve_suggestion(id, SuggestionStatus::Accepted, "admin")
        .await?;
    Ok(Json(resolved))
}

/// `POST /api/suggestions/:id/reject`
pub async fn reject_suggestion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let resolved = state
        .db
        .ai
        .resolve_suggestion(id, SuggestionStatus::Rejected, "admin")
        .await?;
    Ok(Json(resolved))
}

/// `GET /healthz`
pub async fn health() -> &'static str {
    "OK"
}
