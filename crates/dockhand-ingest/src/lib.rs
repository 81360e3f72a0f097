//! # dockhand-ingest
//!
//! The single entry point every source funnels into: place the file in the
//! object store, dedupe by content hash, and atomically record the document
//! together with its audit event and processing job.
//!
//! The transactional co-insertion is the load-bearing part: a document is
//! never visible without a scheduled job, and a job never refers to a
//! missing document.

pub mod validate;

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde_json::json;
use tracing::info;
use uuid::Uuid;

use dockhand_core::defaults::{JOB_TYPE_PROCESS, QUEUE_DEFAULT};
use dockhand_core::models::event_types;
use dockhand_core::{Document, DocumentJobPayload, Result};
use dockhand_db::Database;
use dockhand_storage::{Category, Storage};

/// Document ingestion and path derivation service.
#[derive(Clone)]
pub struct DocumentService {
    db: Database,
    storage: Storage,
}

impl DocumentService {
    pub fn new(db: Database, storage: Storage) -> Self {
        Self { db, storage }
    }

    /// Ingest a file into the catalog.
    ///
    /// Returns `(document, true)` when the content hash already exists; the
    /// staged copy is removed and a `duplicate_found` event is logged on the
    /// existing document. Otherwise inserts the document row (pending), an
    /// `ingested` event, and a `process_document` job in one transaction and
    /// returns `(document, false)`.
    ///
    /// Identity is content-level: filename, source, and timing never
    /// participate in deduplication.
    pub async fn ingest(
        &self,
        source_path: &Path,
        original_filename: &str,
    ) -> Result<(Document, bool)> {
        let start = Instant::now();
        let document_id = Uuid::new_v4();

        let dest_path =
            self.storage
                .path_for(Category::Originals, document_id, &ext_of(original_filename));

        let (content_hash, file_size) = self.storage.copy_and_hash(&dest_path, source_path).await?;

        if let Some(existing) = self.db.documents.get_by_hash(&content_hash).await? {
            self.storage.delete(&dest_path).await;
            info!(
                existing_id = %existing.id,
                hash = %&content_hash[..16],
                "duplicate document detected"
            );

            self.db
                .documents
                .log_event(
                    existing.id,
                    event_types::DUPLICATE_FOUND,
                    Some(&json!({
                        "attempted_filename": original_filename,
                        "source_path": source_path.display().to_string(),
                    })),
                    None,
                    Some(start.elapsed().as_millis() as i32),
                )
                .await;

            return Ok((existing, true));
        }

        let result = self
            .record(document_id, original_filename, &content_hash, file_size, source_path, &dest_path, start)
            .await;

        match result {
            Ok(document) => {
                info!(
                    document_id = %document.id,
                    filename = original_filename,
                    size = file_size,
                    hash = %&content_hash[..16],
                    "document ingested"
                );
                Ok((document, false))
            }
            Err(e) => {
                // The staged original must not outlive a failed record.
                self.storage.delete(&dest_path).await;
                Err(e)
            }
        }
    }

    /// Transactional document + event + job insertion.
    async fn record(
        &self,
        document_id: Uuid,
        original_filename: &str,
        content_hash: &str,
        file_size: i64,
        source_path: &Path,
        dest_path: &Path,
        start: Instant,
    ) -> Result<Document> {
        let mut tx = self.db.pool().begin().await?;

        let document = self
            .db
            .documents
            .insert_in_tx(&mut tx, document_id, original_filename, content_hash, file_size)
            .await?;

        self.db
            .documents
            .insert_event_in_tx(
                &mut tx,
                document.id,
                event_types::INGESTED,
                Some(&json!({
                    "source_path": source_path.display().to_string(),
                    "dest_path": dest_path.display().to_string(),
                    "file_size": file_size,
                    "hash": content_hash,
                })),
                None,
                Some(start.elapsed().as_millis() as i32),
            )
            .await?;

        let payload = serde_json::to_value(DocumentJobPayload {
            document_id: document.id,
        })?;
        self.db
            .jobs
            .enqueue_in_tx(&mut tx, QUEUE_DEFAULT, JOB_TYPE_PROCESS, &payload)
            .await?;

        tx.commit().await?;
        Ok(document)
    }

    /// Path of the stored original for a document.
    pub fn original_path(&self, document: &Document) -> PathBuf {
        self.storage.path_for(
            Category::Originals,
            document.id,
            &ext_of(&document.original_filename),
        )
    }

    /// Path of the (possibly not yet generated) thumbnail.
    pub fn thumbnail_path(&self, document_id: Uuid) -> PathBuf {
        self.storage.path_for(Category::Thumbnails, document_id, ".webp")
    }

    /// Path of the extracted-text artifact.
    pub fn text_path(&self, document_id: Uuid) -> PathBuf {
        self.storage.path_for(Category::Text, document_id, ".txt")
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn db(&self) -> &Database {
        &self.db
    }
}

/// Extension of a filename including the leading dot, or empty.
fn ext_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ext_of_regular_filename() {
        assert_eq!(ext_of("invoice.pdf"), ".pdf");
        assert_eq!(ext_of("scan.PDF"), ".PDF");
    }

    #[test]
    fn test_ext_of_no_extension() {
        assert_eq!(ext_of("README"), "");
        assert_eq!(ext_of(""), "");
    }

    #[test]
    fn test_ext_of_multiple_dots() {
        assert_eq!(ext_of("2024.q1.report.pdf"), ".pdf");
    }
}
