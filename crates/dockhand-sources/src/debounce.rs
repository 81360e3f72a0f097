//! Per-path event debouncing.
//!
//! Large files arrive as a stream of write events; the handler must only
//! fire once the file has been quiet for the configured window. Each path
//! gets its own timer; a new event for the same path resets it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

type TimerMap = Arc<Mutex<HashMap<PathBuf, JoinHandle<()>>>>;

/// Collapses event bursts per path, emitting the path once after quiescence.
pub struct Debouncer {
    delay: Duration,
    timers: TimerMap,
    tx: mpsc::Sender<PathBuf>,
}

impl Debouncer {
    /// Stable paths are delivered on the returned receiver.
    pub fn new(delay: Duration, buffer: usize) -> (Self, mpsc::Receiver<PathBuf>) {
        let (tx, rx) = mpsc::channel(buffer);
        (
            Self {
                delay,
                timers: Arc::new(Mutex::new(HashMap::new())),
                tx,
            },
            rx,
        )
    }

    /// Record an event for `path`, resetting any pending timer.
    pub fn debounce(&self, path: PathBuf) {
        let mut timers = self.timers.lock().expect("debouncer lock poisoned");

        if let Some(existing) = timers.remove(&path) {
            existing.abort();
        }

        let delay = self.delay;
        let timers_ref = self.timers.clone();
        let tx = self.tx.clone();
        let key = path.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            timers_ref
                .lock()
                .expect("debouncer lock poisoned")
                .remove(&key);
            let _ = tx.send(key).await;
        });

        timers.insert(path, handle);
    }

    /// Drop all pending timers without firing them.
    pub fn cancel_all(&self) {
        let mut timers = self.timers.lock().expect("debouncer lock poisoned");
        for (_, handle) in timers.drain() {
            handle.abort();
        }
    }

    /// Number of paths currently waiting out their quiet window.
    pub fn pending(&self) -> usize {
        self.timers.lock().expect("debouncer lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_burst_fires_exactly_once() {
        let (debouncer, mut rx) = Debouncer::new(Duration::from_millis(50), 16);
        let path = PathBuf::from("/inbox/invoice.pdf");

        for _ in 0..10 {
            debouncer.debounce(path.clone());
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let fired = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fired, path);

        // Nothing else arrives after the single delivery.
        let extra = tokio::time::timeout(Duration::from_millis(150), rx.recv()).await;
        assert!(extra.is_err());
    }

    #[tokio::test]
    async fn test_fires_after_last_event_not_first() {
        let (debouncer, mut rx) = Debouncer::new(Duration::from_millis(80), 16);
        let path = PathBuf::from("/inbox/big.pdf");

        let start = tokio::time::Instant::now();
        debouncer.debounce(path.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        debouncer.debounce(path.clone());

        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();

        // The second event reset the timer, so at least 50 + 80 ms elapsed.
        assert!(start.elapsed() >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn test_paths_are_independent() {
        let (debouncer, mut rx) = Debouncer::new(Duration::from_millis(30), 16);

        debouncer.debounce(PathBuf::from("/inbox/a.pdf"));
        debouncer.debounce(PathBuf::from("/inbox/b.pdf"));

        let mut fired = vec![
            tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap()
                .unwrap(),
            tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap()
                .unwrap(),
        ];
        fired.sort();
        assert_eq!(
            fired,
            vec![PathBuf::from("/inbox/a.pdf"), PathBuf::from("/inbox/b.pdf")]
        );
    }

    #[tokio::test]
    async fn test_cancel_all_suppresses_delivery() {
        let (debouncer, mut rx) = Debouncer::new(Duration::from_millis(30), 16);

        debouncer.debounce(PathBuf::from("/inbox/a.pdf"));
        assert_eq!(debouncer.pending(), 1);
        debouncer.cancel_all();
        assert_eq!(debouncer.pending(), 0);

        let nothing = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(nothing.is_err());
    }
}
