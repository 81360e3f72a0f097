//! Job queue repository: durable FIFO-per-queue with visibility timeouts.
//!
//! Workers compete via `FOR UPDATE SKIP LOCKED`; the authoritative queue
//! state is the database, never worker memory. Delivery is at-least-once:
//! a claim that outlives its visibility window is revived by the sweep with
//! its attempt counter preserved, so handlers must be idempotent.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use dockhand_core::defaults::JOB_MAX_ATTEMPTS;
use dockhand_core::{Error, Job, JobStatus, QueueCounts, Result};

const JOB_COLUMNS: &str = "id, queue_name, job_type, payload, status, attempt, max_attempts, \
     scheduled_at, locked_at, locked_until, last_error, dismissed, created_at";

/// PostgreSQL job queue repository.
#[derive(Clone)]
pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_row(row: PgRow) -> Job {
        Job {
            id: row.get("id"),
            queue_name: row.get("queue_name"),
            job_type: row.get("job_type"),
            payload: row.get("payload"),
            status: JobStatus::parse_str(row.get::<String, _>("status").as_str()),
            attempt: row.get("attempt"),
            max_attempts: row.get("max_attempts"),
            scheduled_at: row.get("scheduled_at"),
            locked_at: row.get("locked_at"),
            locked_until: row.get("locked_until"),
            last_error: row.get("last_error"),
            dismissed: row.get("dismissed"),
            created_at: row.get("created_at"),
        }
    }

    /// Insert a pending job eligible immediately (or at `scheduled_at`).
    pub async fn enqueue(
        &self,
        queue_name: &str,
        job_type: &str,
        payload: &JsonValue,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Job> {
        let row = sqlx::query(&format!(
            "INSERT INTO jobs (id, queue_name, job_type, payload, max_attempts, scheduled_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(queue_name)
        .bind(job_type)
        .bind(payload)
        .bind(JOB_MAX_ATTEMPTS)
        .bind(scheduled_at.unwrap_or_else(Utc::now))
        .fetch_one(&self.pool)
        .await?;

        Ok(Self::parse_row(row))
    }

    /// Insert a pending job inside a caller-owned transaction, enabling
    /// atomic "record side effects + enqueue".
    pub async fn enqueue_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        queue_name: &str,
        job_type: &str,
        payload: &JsonValue,
    ) -> Result<Job> {
        let row = sqlx::query(&format!(
            "INSERT INTO jobs (id, queue_name, job_type, payload, max_attempts, scheduled_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(queue_name)
        .bind(job_type)
        .bind(payload)
        .bind(JOB_MAX_ATTEMPTS)
        .bind(Utc::now())
        .fetch_one(&mut **tx)
        .await?;

        Ok(Self::parse_row(row))
    }

    /// Atomically claim the next eligible job on a queue.
    ///
    /// Selects the oldest `(scheduled_at, id)` pending row whose
    /// `scheduled_at` has passed, skipping rows locked by other workers, and
    /// flips it to processing with `attempt + 1` and a visibility window.
    pub async fn dequeue(&self, queue_name: &str, visibility_timeout: Duration) -> Result<Option<Job>> {
        let now = Utc::now();
        let locked_until = now
            + chrono::Duration::from_std(visibility_timeout)
                .map_err(|e| Error::Job(format!("visibility timeout out of range: {e}")))?;

        let row = sqlx::query(&format!(
            "UPDATE jobs
             SET status = 'processing', attempt = attempt + 1,
                 locked_at = $1, locked_until = $2
             WHERE id = (
                 SELECT id FROM jobs
                 WHERE queue_name = $3 AND status = 'pending' AND scheduled_at <= $1
                 ORDER BY scheduled_at, id
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(now)
        .bind(locked_until)
        .bind(queue_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::parse_row))
    }

    /// Mark a claimed job as completed.
    pub async fn complete(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE jobs
             SET status = 'completed', locked_at = NULL, locked_until = NULL
             WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Return a claimed job to pending for a later retry.
    ///
    /// The attempt counter keeps the increment from the claim; only the
    /// eligibility time and last error change.
    pub async fn retry_with_backoff(
        &self,
        id: Uuid,
        scheduled_at: DateTime<Utc>,
        last_error: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE jobs
             SET status = 'pending', scheduled_at = $1, last_error = $2,
                 locked_at = NULL, locked_until = NULL
             WHERE id = $3",
        )
        .bind(scheduled_at)
        .bind(last_error)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Terminal failure after exhausting attempts.
    pub async fn fail(&self, id: Uuid, last_error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE jobs
             SET status = 'failed', last_error = $1, locked_at = NULL, locked_until = NULL
             WHERE id = $2",
        )
        .bind(last_error)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Visibility sweep: revive processing jobs whose lock has expired.
    ///
    /// The attempt counter is deliberately not touched here; a crashed
    /// worker's claim should not consume a delivery attempt.
    pub async fn release_expired(&self, queue_name: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE jobs
             SET status = 'pending', locked_at = NULL, locked_until = NULL
             WHERE queue_name = $1 AND status = 'processing' AND locked_until < $2",
        )
        .bind(queue_name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Self::parse_row))
    }

    /// List jobs for the operational UI, newest first, hiding dismissed rows.
    pub async fn list(
        &self,
        queue_name: Option<&str>,
        status: Option<JobStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Job>> {
        let mut conditions = vec!["NOT dismissed".to_string()];
        let mut param_idx = 1;

        if queue_name.is_some() {
            conditions.push(format!("queue_name = ${param_idx}"));
            param_idx += 1;
        }
        if status.is_some() {
            conditions.push(format!("status = ${param_idx}"));
            param_idx += 1;
        }

        let query = format!(
            "SELECT {JOB_COLUMNS} FROM jobs
             WHERE {}
             ORDER BY created_at DESC
             LIMIT ${param_idx} OFFSET ${}",
            conditions.join(" AND "),
            param_idx + 1
        );

        let mut q = sqlx::query(&query);
        if let Some(queue) = queue_name {
            q = q.bind(queue);
        }
        if let Some(status) = status {
            q = q.bind(status.as_str());
        }
        q = q.bind(limit).bind(offset);

        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    /// Admin retry: put a failed job back at the head of the line.
    pub async fn reset_for_retry(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE jobs
             SET status = 'pending', attempt = 0, scheduled_at = $1,
                 locked_at = NULL, locked_until = NULL
             WHERE id = $2 AND status = 'failed'",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Admin retry for every failed job on a queue.
    pub async fn reset_all_failed(&self, queue_name: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE jobs
             SET status = 'pending', attempt = 0, scheduled_at = $1,
                 locked_at = NULL, locked_until = NULL
             WHERE queue_name = $2 AND status = 'failed' AND NOT dismissed",
        )
        .bind(Utc::now())
        .bind(queue_name)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Logical delete: the job keeps its status but disappears from listings.
    pub async fn dismiss(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE jobs SET dismissed = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Aggregate counts per queue for the dashboard.
    pub async fn counts(&self) -> Result<Vec<QueueCounts>> {
        let rows = sqlx::query(
            "SELECT queue_name,
                    COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                    COUNT(*) FILTER (WHERE status = 'processing') AS processing,
                    COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                    COUNT(*) FILTER (WHERE status = 'failed') AS failed
             FROM jobs
             WHERE NOT dismissed
             GROUP BY queue_name
             ORDER BY queue_name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| QueueCounts {
                queue_name: row.get("queue_name"),
                pending: row.get("pending"),
                processing: row.get("processing"),
                completed: row.get("completed"),
                failed: row.get("failed"),
            })
            .collect())
    }

    pub async fn pending_count(&self, queue_name: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM jobs WHERE queue_name = $1 AND status = 'pending'",
        )
        .bind(queue_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
