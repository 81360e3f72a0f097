//! Network source (SMB/NFS share) repository.

use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use dockhand_core::{
    DuplicateAction, Error, NetworkProtocol, NetworkSource, PostImportAction, Result,
};

const SOURCE_COLUMNS: &str = "id, name, enabled, protocol, host, share_path, username, \
     password_encrypted, continuous_sync, post_import_action, move_subfolder, \
     duplicate_action, batch_size, consecutive_failures, files_imported, \
     last_sync_at, last_error, created_at";

/// Fields accepted when creating a network source.
#[derive(Debug, Clone)]
pub struct CreateNetworkSource {
    pub name: String,
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
}

/// PostgreSQL network source repository.
#[derive(Clone)]
pub struct PgNetworkSourceRepository {
    pool: PgPool,
}

impl PgNetworkSourceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_row(row: PgRow) -> NetworkSource {
        NetworkSource {
            id: row.get("id"),
            name: row.get("name"),
            enabled: row.get("enabled"),
            protocol: NetworkProtocol::parse_str(row.get::<String, _>("protocol").as_str()),
            host: row.get("host"),
            share_path: row.get("share_path"),
            username: row.get("username"),
            password_encrypted: row.get("password_encrypted"),
            continuous_sync: row.get("continuous_sync"),
            post_import_action: PostImportAction::parse_str(
                row.get::<String, _>("post_import_action").as_str(),
            ),
            move_subfolder: row.get("move_subfolder"),
            duplicate_action: DuplicateAction::parse_str(
                row.get::<String, _>("duplicate_action").as_str(),
            ),
            batch_size: row.get("batch_size"),
            consecutive_failures: row.get("consecutive_failures"),
            files_imported: row.get("files_imported"),
            last_sync_at: row.get("last_sync_at"),
            last_error: row.get("last_error"),
            created_at: row.get("created_at"),
        }
    }

    pub async fn create(&self, params: CreateNetworkSource) -> Result<NetworkSource> {
        let row = sqlx::query(&format!(
            "INSERT INTO network_sources
                 (id, name, protocol, host, share_path, username, password_encrypted,
                  continuous_sync, post_import_action, move_subfolder, duplicate_action,
                  batch_size)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {SOURCE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&params.name)
        .bind(params.protocol.as_str())
        .bind(&params.host)
        .bind(&params.share_path)
        .bind(&params.username)
        .bind(&params.password_encrypted)
        .bind(params.continuous_sync)
        .bind(params.post_import_action.as_str())
        .bind(&params.move_subfolder)
        .bind(params.duplicate_action.as_str())
        .bind(params.batch_size)
        .fetch_one(&self.pool)
        .await?;

        Ok(Self::parse_row(row))
    }

    pub async fn get(&self, id: Uuid) -> Result<NetworkSource> {
        let row = sqlx::query(&format!(
            "SELECT {SOURCE_COLUMNS} FROM network_sources WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::parse_row)
            .ok_or_else(|| Error::NotFound(format!("network source {id}")))
    }

    pub async fn list_enabled(&self) -> Result<Vec<NetworkSource>> {
        let rows = sqlx::query(&format!(
            "SELECT {SOURCE_COLUMNS} FROM network_sources WHERE enabled ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    /// Sources the background poller should pick up each tick.
    pub async fn list_continuous(&self) -> Result<Vec<NetworkSource>> {
        let rows = sqlx::query(&format!(
            "SELECT {SOURCE_COLUMNS} FROM network_sources
             WHERE enabled AND continuous_sync
             ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    pub async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<()> {
        sqlx::query("UPDATE network_sources SET enabled = $1 WHERE id = $2")
            .bind(enabled)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Bump the failure streak and return the new count.
    pub async fn increment_failures(&self, id: Uuid) -> Result<i32> {
        let count: i32 = sqlx::query_scalar(
            "UPDATE network_sources
             SET consecutive_failures = consecutive_failures + 1
             WHERE id = $1
             RETURNING consecutive_failures",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn reset_failures(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE network_sources SET consecutive_failures = 0 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn increment_files_imported(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE network_sources SET files_imported = files_imported + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record the outcome of a sync attempt. Best-effort.
    pub async fn update_sync_status(&self, id: Uuid, last_error: Option<&str>) {
        let result = sqlx::query(
            "UPDATE network_sources SET last_sync_at = $1, last_error = $2 WHERE id = $3",
        )
        .bind(Utc::now())
        .bind(last_error)
        .bind(id)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(source_id = %id, error = %e, "failed to update sync status");
        }
    }

    /// Append a per-file event to the source log. Best-effort.
    pub async fn log_event(
        &self,
        source_id: Uuid,
        filename: &str,
        remote_path: Option<&str>,
        action: &str,
        document_id: Option<Uuid>,
        error_message: Option<&str>,
    ) {
        let result = sqlx::query(
            "INSERT INTO network_source_events
                 (source_id, filename, remote_path, action, document_id, error_message)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(source_id)
        .bind(filename)
        .bind(remote_path)
        .bind(action)
        .bind(document_id)
        .bind(error_message)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(source_id = %source_id, filename, error = %e, "failed to log source event");
        }
    }
}
