//! Connectivity monitor
//!
//! Tracks whether the API host is reachable and starts a sync pass on
//! every offline to online edge. The signal comes either from an external
//! caller through [`ConnectivityMonitor::report`] or from the periodic
//! probe in [`ConnectivityMonitor::run_probe`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use verdiplan_core::ports::IRemoteApi;

use crate::manager::{SyncOutcome, SyncQueueManager};

// ============================================================================
// ConnectivityState
// ============================================================================

/// Shared online flag
///
/// Cloning shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct ConnectivityState(Arc<AtomicBool>);

impl ConnectivityState {
    pub fn new(online: bool) -> Self {
        Self(Arc::new(AtomicBool::new(online)))
    }

    pub fn is_online(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, online: bool) {
        self.0.store(online, Ordering::Release);
    }

    /// Stores the new value and returns the previous one
    pub fn swap(&self, online: bool) -> bool {
        self.0.swap(online, Ordering::AcqRel)
    }
}

// ============================================================================
// ConnectivityMonitor
// ============================================================================

/// Edge-triggered bridge between the online signal and the sync manager
pub struct ConnectivityMonitor {
    manager: Arc<SyncQueueManager>,
    online_tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    /// Creates a monitor over the manager's connectivity state
    pub fn new(manager: Arc<SyncQueueManager>) -> Self {
        let online = manager.connectivity().is_online();
        let (online_tx, _) = watch::channel(online);
        Self { manager, online_tx }
    }

    pub fn is_online(&self) -> bool {
        self.manager.connectivity().is_online()
    }

    /// Returns a receiver that observes every change of the online flag
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.online_tx.subscribe()
    }

    /// Records a connectivity observation
    ///
    /// On a transition from offline to online the manager is triggered once
    /// and the outcome of that pass is returned. Any other observation
    /// returns `None`.
    pub async fn report(&self, online: bool) -> Result<Option<SyncOutcome>> {
        let was_online = self.manager.connectivity().swap(online);
        self.online_tx.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        });

        if online == was_online {
            return Ok(None);
        }

        if !online {
            info!("Connectivity lost");
            return Ok(None);
        }

        info!("Connectivity restored, starting sync");
        let outcome = self.manager.sync_all().await?;
        Ok(Some(outcome))
    }

    /// Probes the API host every `interval` until cancelled
    ///
    /// A successful ping counts as online, any error as offline.
    pub async fn run_probe(
        &self,
        api: Arc<dyn IRemoteApi>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        info!(interval_secs = interval.as_secs(), "Connectivity probe starting");
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let online = match api.ping().await {
                        Ok(()) => true,
                        Err(e) => {
                            debug!(error = %e, "API host unreachable");
                            false
                        }
                    };

                    match self.report(online).await {
                        Ok(Some(outcome)) => debug!(?outcome, "Reconnect sync finished"),
                        Ok(None) => {}
                        Err(e) => warn!(error = %format!("{e:#}"), "Reconnect sync aborted"),
                    }
                }
            }
        }

        info!("Connectivity probe stopped");
    }
}
