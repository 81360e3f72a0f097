//! Queue worker pools: polling, retry with full-jitter backoff, and the
//! visibility sweep that revives claims from crashed workers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::Rng;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use dockhand_core::defaults::{
    JOB_POLL_INTERVAL_MS, JOB_WORKER_COUNT, RETRY_BASE_DELAY_MS, RETRY_MAX_DELAY_SECS,
    VISIBILITY_TIMEOUT_SECS,
};
use dockhand_core::{Job, Result};
use dockhand_db::Database;

use crate::handler::{HandlerRegistry, JobContext};

/// Queue worker configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// How often idle workers poll for jobs.
    pub poll_interval: Duration,
    /// How long a claim stays invisible before the sweep revives it.
    pub visibility_timeout: Duration,
    /// Concurrent workers per queue.
    pub worker_count: usize,
    /// Base delay for exponential backoff.
    pub base_retry_delay: Duration,
    /// Cap on the retry delay.
    pub max_retry_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(JOB_POLL_INTERVAL_MS),
            visibility_timeout: Duration::from_secs(VISIBILITY_TIMEOUT_SECS),
            worker_count: JOB_WORKER_COUNT,
            base_retry_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
            max_retry_delay: Duration::from_secs(RETRY_MAX_DELAY_SECS),
        }
    }
}

impl QueueConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count.max(1);
        self
    }

    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }
}

/// Full-jitter exponential backoff: `uniform(0, min(cap, base · 2^attempt))`.
///
/// The jitter avoids retry storms after a shared outage.
pub fn next_retry_delay(config: &QueueConfig, attempt: i32) -> Duration {
    let base = config.base_retry_delay.as_millis() as f64;
    let cap = config.max_retry_delay.as_millis() as f64;
    let backoff = (base * 2f64.powi(attempt.max(0))).min(cap);
    let jittered = rand::thread_rng().gen::<f64>() * backoff;
    Duration::from_millis(jittered as u64)
}

/// A queue's worker pool. One instance serves one queue name; the handler
/// registry is shared across its workers.
pub struct Queue {
    db: Database,
    config: QueueConfig,
    registry: Arc<HandlerRegistry>,
}

impl Queue {
    pub fn new(db: Database, config: QueueConfig, registry: HandlerRegistry) -> Self {
        Self {
            db,
            config,
            registry: Arc::new(registry),
        }
    }

    /// Start `worker_count` workers plus the visibility sweeper for a queue.
    ///
    /// Workers stop claiming when the token fires and finish their current
    /// job first; shutdown awaits the returned handles.
    pub fn start(self: &Arc<Self>, queue_name: &str, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        info!(
            queue = queue_name,
            workers = self.config.worker_count,
            "queue starting"
        );

        let mut handles = Vec::with_capacity(self.config.worker_count + 1);

        for worker_id in 0..self.config.worker_count {
            let queue = self.clone();
            let queue_name = queue_name.to_string();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                queue.worker_loop(&queue_name, worker_id, cancel).await;
            }));
        }

        let queue = self.clone();
        let queue_name = queue_name.to_string();
        handles.push(tokio::spawn(async move {
            queue.sweep_loop(&queue_name, cancel).await;
        }));

        handles
    }

    async fn worker_loop(&self, queue_name: &str, worker_id: usize, cancel: CancellationToken) {
        debug!(queue = queue_name, worker_id, "worker started");

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(queue = queue_name, worker_id, "worker stopping");
                    return;
                }
                _ = ticker.tick() => {
                    // Drain the queue before sleeping again.
                    while !cancel.is_cancelled() {
                        match self.db.jobs.dequeue(queue_name, self.config.visibility_timeout).await {
                            Ok(Some(job)) => self.process_job(queue_name, worker_id, job, &cancel).await,
                            Ok(None) => break,
                            Err(e) => {
                                error!(queue = queue_name, worker_id, error = %e, "failed to dequeue");
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    async fn process_job(
        &self,
        queue_name: &str,
        worker_id: usize,
        job: Job,
        cancel: &CancellationToken,
    ) {
        let Some(handler) = self.registry.get(&job.job_type) else {
            error!(job_id = %job.id, job_type = %job.job_type, "no handler for job type");
            if let Err(e) = self
                .db
                .jobs
                .fail(job.id, &format!("no handler registered for job type: {}", job.job_type))
                .await
            {
                error!(job_id = %job.id, error = %e, "failed to mark job as failed");
            }
            return;
        };

        info!(
            job_id = %job.id,
            job_type = %job.job_type,
            queue = queue_name,
            attempt = job.attempt,
            worker_id,
            "processing job"
        );

        let start = Instant::now();
        let ctx = JobContext::new(cancel.child_token());
        let result = handler.execute(&ctx, &job).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                info!(job_id = %job.id, duration_ms, "job completed");
                if let Err(e) = self.db.jobs.complete(job.id).await {
                    error!(job_id = %job.id, error = %e, "failed to mark job complete");
                }
            }
            Err(job_err) => {
                warn!(
                    job_id = %job.id,
                    error = %job_err,
                    duration_ms,
                    attempt = job.attempt,
                    "job failed"
                );
                if let Err(e) = self.handle_failure(&job, &job_err.to_string()).await {
                    error!(job_id = %job.id, error = %e, "failed to record job failure");
                }
            }
        }
    }

    /// Retry with backoff while attempts remain; terminal failure after.
    async fn handle_failure(&self, job: &Job, message: &str) -> Result<()> {
        if job.attempt >= job.max_attempts {
            warn!(job_id = %job.id, attempts = job.attempt, "job exhausted retries");
            self.db.jobs.fail(job.id, message).await?;
            return Ok(());
        }

        let delay = next_retry_delay(&self.config, job.attempt);
        let scheduled_at = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::seconds(1));

        self.db
            .jobs
            .retry_with_backoff(job.id, scheduled_at, message)
            .await?;

        info!(
            job_id = %job.id,
            delay_ms = delay.as_millis() as u64,
            "job scheduled for retry"
        );
        Ok(())
    }

    /// Periodically revive processing jobs whose visibility window expired,
    /// so a crashed worker never loses a job.
    async fn sweep_loop(&self, queue_name: &str, cancel: CancellationToken) {
        let period = self.config.visibility_timeout.min(Duration::from_secs(60));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {
                    match self.db.jobs.release_expired(queue_name).await {
                        Ok(0) => {}
                        Ok(released) => {
                            warn!(queue = queue_name, released, "revived expired job claims");
                        }
                        Err(e) => error!(queue = queue_name, error = %e, "visibility sweep failed"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> QueueConfig {
        QueueConfig::default()
    }

    #[test]
    fn test_config_defaults() {
        let config = config();
        assert_eq!(config.poll_interval, Duration::from_millis(1_000));
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.visibility_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_config_builder() {
        let config = config()
            .with_poll_interval(Duration::from_millis(50))
            .with_worker_count(8)
            .with_visibility_timeout(Duration::from_secs(30));
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.worker_count, 8);
        assert_eq!(config.visibility_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_worker_count_floor_is_one() {
        assert_eq!(config().with_worker_count(0).worker_count, 1);
    }

    #[test]
    fn test_backoff_within_envelope() {
        let config = config();
        for attempt in 0..10 {
            let delay = next_retry_delay(&config, attempt);
            let envelope = Duration::from_millis(
                (RETRY_BASE_DELAY_MS as f64 * 2f64.powi(attempt)) as u64,
            )
            .min(Duration::from_secs(RETRY_MAX_DELAY_SECS));
            assert!(delay <= envelope, "attempt {attempt}: {delay:?} > {envelope:?}");
        }
    }

    #[test]
    fn test_backoff_never_exceeds_cap_at_high_attempts() {
        let config = config();
        for attempt in [30, 63, 100, 1_000] {
            let delay = next_retry_delay(&config, attempt);
            assert!(delay <= Duration::from_secs(RETRY_MAX_DELAY_SECS));
        }
    }

    #[test]
    fn test_backoff_jitter_varies() {
        let config = config();
        // With full jitter, 32 draws at the same attempt collapsing to one
        // value is vanishingly unlikely.
        let draws: Vec<_> = (0..32).map(|_| next_retry_delay(&config, 10)).collect();
        let first = draws[0];
        assert!(draws.iter().any(|d| *d != first));
    }

    #[test]
    fn test_backoff_negative_attempt_treated_as_zero() {
        let config = config();
        let delay = next_retry_delay(&config, -5);
        assert!(delay <= config.base_retry_delay);
    }
}
