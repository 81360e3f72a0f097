//! HTTP upload source: multipart parts staged to temp files, magic-byte
//! validated, and handed to the ingest service.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use dockhand_ingest::validate::is_pdf_file;

use crate::AppState;

/// Per-file outcome returned to the client.
#[derive(Debug, Serialize)]
pub struct UploadResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<Uuid>,
    pub filename: String,
    pub is_duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResult {
    fn failure(filename: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            document_id: None,
            filename: filename.into(),
            is_duplicate: false,
            error: Some(error.into()),
        }
    }
}

/// `POST /api/upload`: single file in the `file` field.
pub async fn upload_single(
    State(state): State<AppState>,
    multipart: Multipart,
) -> (StatusCode, Json<UploadResult>) {
    let mut results = collect_uploads(&state, multipart, &["file"]).await;

    let Some(result) = results.pop() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(UploadResult::failure("", "No file provided")),
        );
    };

    let status = if !result.success {
        StatusCode::BAD_REQUEST
    } else if result.is_duplicate {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    (status, Json(result))
}

/// `POST /api/upload/batch`: multiple files in `files[]` (or `file`).
pub async fn upload_batch(
    State(state): State<AppState>,
    multipart: Multipart,
) -> (StatusCode, Json<Vec<UploadResult>>) {
    let results = collect_uploads(&state, multipart, &["files[]", "files", "file"]).await;

    if results.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(vec![UploadResult::failure("", "No files provided")]),
        );
    }

    let has_errors = results.iter().any(|r| !r.success);
    let all_duplicates = results.iter().all(|r| r.is_duplicate);

    let status = if has_errors {
        StatusCode::MULTI_STATUS
    } else if all_duplicates {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    (status, Json(results))
}

/// Drain matching multipart fields, processing each part independently.
async fn collect_uploads(
    state: &AppState,
    mut multipart: Multipart,
    field_names: &[&str],
) -> Vec<UploadResult> {
    let mut results = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                results.push(UploadResult::failure("", format!("Invalid form data: {e}")));
                break;
            }
        };

        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if !field_names.contains(&name.as_str()) {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload.pdf").to_string();

        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                results.push(UploadResult::failure(
                    filename,
                    format!("Failed to read uploaded file: {e}"),
                ));
                continue;
            }
        };

        results.push(process_upload(state, &filename, &bytes).await);
    }

    results
}

/// Stage one upload in a temp file, validate, and ingest.
async fn process_upload(state: &AppState, filename: &str, bytes: &[u8]) -> UploadResult {
    let temp = match tempfile::Builder::new().prefix("upload-").suffix(".pdf").tempfile() {
        Ok(temp) => temp,
        Err(e) => {
            error!(filename, error = %e, "failed to create temp file");
            return UploadResult::failure(filename, "Failed to process upload");
        }
    };
    let temp_path = temp.into_temp_path();

    if let Err(e) = tokio::fs::write(&temp_path, bytes).await {
        error!(filename, error = %e, "failed to write temp file");
        return UploadResult::failure(filename, "Failed to process upload");
    }

    // Extensions and client content types are not trusted.
    match is_pdf_file(&temp_path).await {
        Ok(true) => {}
        Ok(false) => return UploadResult::failure(filename, "Only PDF files are allowed"),
        Err(e) => {
            error!(filename, error = %e, "failed to validate upload");
            return UploadResult::failure(filename, "Failed to process upload");
        }
    }

    match state.documents.ingest(&temp_path, filename).await {
        Ok((document, is_duplicate)) => UploadResult {
            success: true,
            document_id: Some(document.id),
            filename: filename.to_string(),
            is_duplicate,
            error: None,
        },
        Err(e) => {
            error!(filename, error = %e, "failed to ingest document");
            UploadResult::failure(filename, format!("Failed to ingest document: {e}"))
        }
    }
}
