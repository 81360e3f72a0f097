//! Fixed-cadence poller for continuous-sync network sources.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use dockhand_core::defaults::SYNC_INTERVAL_SECS;

use crate::sync::NetworkService;

/// Runs periodic sync for continuous-sync sources.
pub struct Poller {
    service: Arc<NetworkService>,
    interval: Duration,
}

impl Poller {
    pub fn new(service: Arc<NetworkService>) -> Self {
        Self {
            service,
            interval: Duration::from_secs(SYNC_INTERVAL_SECS),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Start the polling loop: one sync pass immediately, then every
    /// interval until the token fires.
    pub fn start(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = self.interval.as_secs(), "network poller started");

            self.service.sync_continuous(&cancel).await;

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The interval fires immediately once; skip that first tick
            // since the initial sync just ran.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("network poller stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        self.service.sync_continuous(&cancel).await;
                    }
                }
            }
        })
    }
}
