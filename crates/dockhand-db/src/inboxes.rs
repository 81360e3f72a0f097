//! Inbox (watched local directory) repository.

use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use dockhand_core::{DuplicateAction, Error, Inbox, Result};

const INBOX_COLUMNS: &str = "id, name, path, error_path, enabled, duplicate_action, \
     last_scan_at, last_error, created_at";

/// PostgreSQL inbox repository.
#[derive(Clone)]
pub struct PgInboxRepository {
    pool: PgPool,
}

impl PgInboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_row(row: PgRow) -> Inbox {
        Inbox {
            id: row.get("id"),
            name: row.get("name"),
            path: row.get("path"),
            error_path: row.get("error_path"),
            enabled: row.get("enabled"),
            duplicate_action: DuplicateAction::parse_str(
                row.get::<String, _>("duplicate_action").as_str(),
            ),
            last_scan_at: row.get("last_scan_at"),
            last_error: row.get("last_error"),
            created_at: row.get("created_at"),
        }
    }

    pub async fn create(
        &self,
        name: &str,
        path: &str,
        error_path: Option<&str>,
        duplicate_action: DuplicateAction,
        enabled: bool,
    ) -> Result<Inbox> {
        let row = sqlx::query(&format!(
            "INSERT INTO inboxes (id, name, path, error_path, duplicate_action, enabled)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {INBOX_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(path)
        .bind(error_path)
        .bind(duplicate_action.as_str())
        .bind(enabled)
        .fetch_one(&self.pool)
        .await?;

        Ok(Self::parse_row(row))
    }

    pub async fn get(&self, id: Uuid) -> Result<Inbox> {
        let row = sqlx::query(&format!("SELECT {INBOX_COLUMNS} FROM inboxes WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::parse_row)
            .ok_or_else(|| Error::NotFound(format!("inbox {id}")))
    }

    pub async fn get_by_path(&self, path: &str) -> Result<Option<Inbox>> {
        let row = sqlx::query(&format!(
            "SELECT {INBOX_COLUMNS} FROM inboxes WHERE path = $1"
        ))
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::parse_row))
    }

    pub async fn list_enabled(&self) -> Result<Vec<Inbox>> {
        let rows = sqlx::query(&format!(
            "SELECT {INBOX_COLUMNS} FROM inboxes WHERE enabled ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    pub async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<()> {
        sqlx::query("UPDATE inboxes SET enabled = $1 WHERE id = $2")
            .bind(enabled)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Touch `last_scan_at`, optionally recording an error. Best-effort.
    pub async fn update_status(&self, id: Uuid, last_error: Option<&str>) {
        let result = sqlx::query(
            "UPDATE inboxes SET last_scan_at = $1, last_error = $2 WHERE id = $3",
        )
        .bind(Utc::now())
        .bind(last_error)
        .bind(id)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(inbox_id = %id, error = %e, "failed to update inbox status");
        }
    }

    /// Append a per-file event to the inbox log. Best-effort.
    pub async fn log_event(
        &self,
        inbox_id: Uuid,
        filename: &str,
        action: &str,
        document_id: Option<Uuid>,
        error_message: Option<&str>,
    ) {
        let result = sqlx::query(
            "INSERT INTO inbox_events (inbox_id, filename, action, document_id, error_message)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(inbox_id)
        .bind(filename)
        .bind(action)
        .bind(document_id)
        .bind(error_message)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(inbox_id = %inbox_id, filename, error = %e, "failed to log inbox event");
        }
    }
}
