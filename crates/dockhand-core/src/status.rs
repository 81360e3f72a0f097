//! In-process fan-out of document lifecycle events.
//!
//! The broadcaster holds a bounded queue per subscriber and never blocks the
//! sender: a slow consumer only loses its own updates. Subscribers hold an
//! RAII [`Subscription`]; dropping it unregisters the queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::defaults::{MAX_SUBSCRIBERS, SUBSCRIBER_BUFFER};

/// Lifecycle stage names carried by [`StatusUpdate`].
pub mod stages {
    pub const PENDING: &str = "pending";
    pub const PROCESSING: &str = "processing";
    pub const COMPLETED: &str = "completed";
    pub const FAILED: &str = "failed";
    pub const AI_PROCESSING: &str = "ai_processing";
    pub const AI_COMPLETE: &str = "ai_complete";
    pub const AI_FAILED: &str = "ai_failed";
}

/// A processing status change pushed to subscribers.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub document_id: Uuid,
    /// Lifecycle stage: `processing`, `completed`, `failed`,
    /// `ai_processing`, `ai_complete`, `ai_failed`.
    pub status: String,
    pub error: Option<String>,
    pub queue_name: String,
}

impl StatusUpdate {
    pub fn new(document_id: Uuid, status: impl Into<String>, queue_name: impl Into<String>) -> Self {
        Self {
            document_id,
            status: status.into(),
            error: None,
            queue_name: queue_name.into(),
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

type SubscriberMap = Arc<RwLock<HashMap<u64, mpsc::Sender<StatusUpdate>>>>;

/// Fan-out hub for [`StatusUpdate`]s.
#[derive(Clone)]
pub struct StatusBroadcaster {
    subscribers: SubscriberMap,
    next_id: Arc<AtomicU64>,
}

impl StatusBroadcaster {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register a new subscriber.
    ///
    /// Returns `None` when [`MAX_SUBSCRIBERS`] are already connected, so the
    /// caller can reject the connection instead of queueing unbounded.
    pub fn subscribe(&self) -> Option<Subscription> {
        let mut subs = self.subscribers.write().expect("subscriber lock poisoned");
        if subs.len() >= MAX_SUBSCRIBERS {
            warn!(
                current = subs.len(),
                max = MAX_SUBSCRIBERS,
                "max subscribers reached, rejecting new subscription"
            );
            return None;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        subs.insert(id, tx);
        debug!(total = subs.len(), "subscriber added");

        Some(Subscription {
            id,
            rx,
            subscribers: self.subscribers.clone(),
        })
    }

    /// Send an update to every subscriber without blocking.
    ///
    /// Subscribers whose buffer is full are skipped for this update.
    pub fn broadcast(&self, update: StatusUpdate) {
        let subs = self.subscribers.read().expect("subscriber lock poisoned");
        if subs.is_empty() {
            return;
        }

        debug!(
            document_id = %update.document_id,
            status = %update.status,
            subscribers = subs.len(),
            "broadcasting status update"
        );

        for tx in subs.values() {
            if tx.try_send(update.clone()).is_err() {
                warn!(
                    document_id = %update.document_id,
                    "subscriber buffer full, dropping update"
                );
            }
        }
    }

    /// Current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().expect("subscriber lock poisoned").len()
    }
}

impl Default for StatusBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Receive side of a subscription. Dropping it unregisters the subscriber.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<StatusUpdate>,
    subscribers: SubscriberMap,
}

impl Subscription {
    /// Wait for the next update. Returns `None` after the broadcaster and
    /// all in-flight updates are gone.
    pub async fn recv(&mut self) -> Option<StatusUpdate> {
        self.rx.recv().await
    }

    /// Non-blocking receive, used by tests and polling consumers.
    pub fn try_recv(&mut self) -> Option<StatusUpdate> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Ok(mut subs) = self.subscribers.write() {
            subs.remove(&self.id);
            debug!(total = subs.len(), "subscriber removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(status: &str) -> StatusUpdate {
        StatusUpdate::new(Uuid::new_v4(), status, crate::defaults::QUEUE_DEFAULT)
    }

    #[tokio::test]
    async fn test_subscribe_and_receive() {
        let broadcaster = StatusBroadcaster::new();
        let mut sub = broadcaster.subscribe().unwrap();

        let sent = update("processing");
        broadcaster.broadcast(sent.clone());

        let got = sub.recv().await.unwrap();
        assert_eq!(got.document_id, sent.document_id);
        assert_eq!(got.status, "processing");
        assert!(got.error.is_none());
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let broadcaster = StatusBroadcaster::new();
        let sub = broadcaster.subscribe().unwrap();
        assert_eq!(broadcaster.subscriber_count(), 1);

        drop(sub);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_cap_rejects() {
        let broadcaster = StatusBroadcaster::new();
        let subs: Vec<_> = (0..MAX_SUBSCRIBERS)
            .map(|_| broadcaster.subscribe().unwrap())
            .collect();
        assert_eq!(broadcaster.subscriber_count(), MAX_SUBSCRIBERS);

        assert!(broadcaster.subscribe().is_none());

        drop(subs);
        assert!(broadcaster.subscribe().is_some());
    }

    #[tokio::test]
    async fn test_slow_subscriber_drops_without_blocking() {
        let broadcaster = StatusBroadcaster::new();
        let mut slow = broadcaster.subscribe().unwrap();

        // Overfill the buffer; the extra updates must be dropped, not block.
        for _ in 0..SUBSCRIBER_BUFFER + 8 {
            broadcaster.broadcast(update("processing"));
        }

        let mut received = 0;
        while slow.try_recv().is_some() {
            received += 1;
        }
        assert_eq!(received, SUBSCRIBER_BUFFER);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_subscribers() {
        let broadcaster = StatusBroadcaster::new();
        let mut a = broadcaster.subscribe().unwrap();
        let mut b = broadcaster.subscribe().unwrap();

        broadcaster.broadcast(update("completed"));

        assert_eq!(a.recv().await.unwrap().status, "completed");
        assert_eq!(b.recv().await.unwrap().status, "completed");
    }

    #[test]
    fn test_update_with_error() {
        let u = update("failed").with_error("text extraction failed");
        assert_eq!(u.error.as_deref(), Some("text extraction failed"));
    }
}
