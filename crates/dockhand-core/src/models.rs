//! Entity models shared across the dockhand crates.
//!
//! Enum columns are stored as text; each enum carries `as_str`/`parse_str`
//! conversions used by the repositories. Unknown strings fall back to a safe
//! variant rather than failing row decoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Lifecycle status of a document's processing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse_str(s: &str) -> Self {
        match s {
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// The canonical stored artifact.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: Uuid,
    pub original_filename: String,
    /// Lowercase hex SHA-256 of the file bytes. Unique across all documents.
    pub content_hash: String,
    pub file_size: i64,
    pub processing_status: ProcessingStatus,
    pub text_content: Option<String>,
    pub thumbnail_generated: bool,
    pub processing_error: Option<String>,
    pub correspondent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Immutable audit record attached to a document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentEvent {
    pub id: i64,
    pub document_id: Uuid,
    pub event_type: String,
    pub payload: Option<JsonValue>,
    pub error_message: Option<String>,
    pub duration_ms: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Event types written to the document audit trail.
pub mod event_types {
    pub const INGESTED: &str = "ingested";
    pub const DUPLICATE_FOUND: &str = "duplicate_found";
    pub const PROCESSING_COMPLETE: &str = "processing_complete";
    pub const QUARANTINED: &str = "quarantined";
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Queue item status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse_str(s: &str) -> Self {
        match s {
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// A durable queue item. The payload is opaque to the queue itself.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub queue_name: String,
    pub job_type: String,
    pub payload: JsonValue,
    pub status: JobStatus,
    pub attempt: i32,
    pub max_attempts: i32,
    pub scheduled_at: DateTime<Utc>,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub dismissed: bool,
    pub created_at: DateTime<Utc>,
}

/// Payload for `process_document` and `ai_analyze` jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentJobPayload {
    pub document_id: Uuid,
}

/// Aggregate job counts for one (queue, status) cell.
#[derive(Debug, Clone, Serialize)]
pub struct QueueCounts {
    pub queue_name: String,
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

// ---------------------------------------------------------------------------
// Inboxes (watched local directories)
// ---------------------------------------------------------------------------

/// What to do with a source file whose content already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateAction {
    Delete,
    Rename,
    Skip,
}

impl DuplicateAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Rename => "rename",
            Self::Skip => "skip",
        }
    }

    pub fn parse_str(s: &str) -> Self {
        match s {
            "rename" => Self::Rename,
            "skip" => Self::Skip,
            _ => Self::Delete,
        }
    }
}

/// A watched local directory.
#[derive(Debug, Clone, Serialize)]
pub struct Inbox {
    pub id: Uuid,
    pub name: String,
    pub path: String,
    pub error_path: Option<String>,
    pub enabled: bool,
    pub duplicate_action: DuplicateAction,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-source event actions, shared by inbox and network source logs.
pub mod source_actions {
    pub const IMPORTED: &str = "imported";
    pub const DUPLICATE: &str = "duplicate";
    pub const ERROR: &str = "error";
    pub const SKIPPED: &str = "skipped";
    pub const INVALID: &str = "invalid";
}

// ---------------------------------------------------------------------------
// Network sources
// ---------------------------------------------------------------------------

/// Wire protocol of a remote share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkProtocol {
    Smb,
    Nfs,
}

impl NetworkProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Smb => "smb",
            Self::Nfs => "nfs",
        }
    }

    pub fn parse_str(s: &str) -> Self {
        match s {
            "nfs" => Self::Nfs,
            _ => Self::Smb,
        }
    }
}

/// What happens to the remote file after a successful import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostImportAction {
    Leave,
    Delete,
    Move,
}

impl PostImportAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Leave => "leave",
            Self::Delete => "delete",
            Self::Move => "move",
        }
    }

    pub fn parse_str(s: &str) -> Self {
        match s {
            "delete" => Self::Delete,
            "move" => Self::Move,
            _ => Self::Leave,
        }
    }
}

/// Configuration row for one SMB or NFS share.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkSource {
    pub id: Uuid,
    pub name: String,
    pub enabled: bool,
    pub protocol: NetworkProtocol,
    pub host: String,
    pub share_path: String,
    pub username: Option<String>,
    pub password_encrypted: Option<String>,
    pub continuous_sync: bool,
    pub post_import_action: PostImportAction,
    pub move_subfolder: Option<String>,
    pub duplicate_action: DuplicateAction,
    pub batch_size: i32,
    pub consecutive_failures: i32,
    pub files_imported: i64,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Taxonomy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Correspondent {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// AI
// ---------------------------------------------------------------------------

/// What kind of association a suggestion proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionType {
    Tag,
    Correspondent,
}

impl SuggestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tag => "tag",
            Self::Correspondent => "correspondent",
        }
    }

    pub fn parse_str(s: &str) -> Self {
        match s {
            "correspondent" => Self::Correspondent,
            _ => Self::Tag,
        }
    }
}

/// Resolution state of a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    AutoApplied,
    Accepted,
    Rejected,
}

impl SuggestionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::AutoApplied => "auto_applied",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse_str(s: &str) -> Self {
        match s {
            "auto_applied" => Self::AutoApplied,
            "accepted" => Self::Accepted,
            "rejected" => Self::Rejected,
            _ => Self::Pending,
        }
    }
}

/// An AI-produced candidate association stored for audit or review.
#[derive(Debug, Clone, Serialize)]
pub struct AiSuggestion {
    pub id: Uuid,
    pub document_id: Uuid,
    pub job_id: Option<Uuid>,
    pub suggestion_type: SuggestionType,
    pub value: String,
    pub confidence: f64,
    pub reasoning: Option<String>,
    pub is_new: bool,
    pub status: SuggestionStatus,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Singleton AI configuration row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSettings {
    pub preferred_provider: Option<String>,
    pub max_pages: i32,
    pub auto_process: bool,
    pub auto_apply_threshold: f64,
    pub review_threshold: f64,
    pub min_word_count: i32,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            preferred_provider: None,
            max_pages: 5,
            auto_process: false,
            auto_apply_threshold: 0.85,
            review_threshold: 0.5,
            min_word_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_status_round_trip() {
        for status in [
            ProcessingStatus::Pending,
            ProcessingStatus::Processing,
            ProcessingStatus::Completed,
            ProcessingStatus::Failed,
        ] {
            assert_eq!(ProcessingStatus::parse_str(status.as_str()), status);
        }
    }

    #[test]
    fn test_processing_status_unknown_fallback() {
        assert_eq!(
            ProcessingStatus::parse_str("garbage"),
            ProcessingStatus::Pending
        );
        assert_eq!(ProcessingStatus::parse_str(""), ProcessingStatus::Pending);
    }

    #[test]
    fn test_job_status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse_str(status.as_str()), status);
        }
    }

    #[test]
    fn test_duplicate_action_round_trip() {
        for action in [
            DuplicateAction::Delete,
            DuplicateAction::Rename,
            DuplicateAction::Skip,
        ] {
            assert_eq!(DuplicateAction::parse_str(action.as_str()), action);
        }
    }

    #[test]
    fn test_duplicate_action_unknown_falls_back_to_delete() {
        assert_eq!(DuplicateAction::parse_str("???"), DuplicateAction::Delete);
    }

    #[test]
    fn test_network_protocol_round_trip() {
        assert_eq!(NetworkProtocol::parse_str("smb"), NetworkProtocol::Smb);
        assert_eq!(NetworkProtocol::parse_str("nfs"), NetworkProtocol::Nfs);
    }

    #[test]
    fn test_post_import_action_round_trip() {
        for action in [
            PostImportAction::Leave,
            PostImportAction::Delete,
            PostImportAction::Move,
        ] {
            assert_eq!(PostImportAction::parse_str(action.as_str()), action);
        }
    }

    #[test]
    fn test_suggestion_status_round_trip() {
        for status in [
            SuggestionStatus::Pending,
            SuggestionStatus::AutoApplied,
            SuggestionStatus::Accepted,
            SuggestionStatus::Rejected,
        ] {
            assert_eq!(SuggestionStatus::parse_str(status.as_str()), status);
        }
    }

    #[test]
    fn test_ai_settings_defaults() {
        let settings = AiSettings::default();
        assert_eq!(settings.max_pages, 5);
        assert!(!settings.auto_process);
        assert!(settings.auto_apply_threshold > settings.review_threshold);
        assert_eq!(settings.min_word_count, 0);
    }

    #[test]
    fn test_document_job_payload_serialization() {
        let payload = DocumentJobPayload {
            document_id: Uuid::nil(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json["document_id"],
            "00000000-0000-0000-0000-000000000000"
        );

        let back: DocumentJobPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back.document_id, Uuid::nil());
    }
}
