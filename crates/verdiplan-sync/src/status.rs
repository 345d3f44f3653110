//! User-facing sync status
//!
//! Folds the manager's events, the online flag and a periodic pending
//! count into a single [`SyncStatus`] published on a `watch` channel.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connectivity::ConnectivityMonitor;
use crate::events::SyncEvent;
use crate::manager::SyncQueueManager;

/// Snapshot of what the user should see
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    /// Pending photos plus queued actions
    pub pending_count: u64,
    /// True between the start and the completion of a media phase
    pub syncing: bool,
    /// Completion time of the last media phase
    pub last_sync: Option<DateTime<Utc>>,
    pub online: bool,
}

pub struct StatusAggregator {
    manager: Arc<SyncQueueManager>,
    status_tx: watch::Sender<SyncStatus>,
}

impl StatusAggregator {
    pub fn new(manager: Arc<SyncQueueManager>) -> Self {
        let initial = SyncStatus {
            online: manager.connectivity().is_online(),
            ..SyncStatus::default()
        };
        let (status_tx, _) = watch::channel(initial);
        Self { manager, status_tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    pub fn current(&self) -> SyncStatus {
        self.status_tx.borrow().clone()
    }

    /// Re-reads the pending count and the online flag
    pub async fn refresh(&self) -> Result<()> {
        let stats = self.manager.get_stats().await?;
        let online = self.manager.connectivity().is_online();
        self.status_tx.send_if_modified(|status| {
            let changed = status.pending_count != stats.total || status.online != online;
            status.pending_count = stats.total;
            status.online = online;
            changed
        });
        Ok(())
    }

    /// Applies one manager event
    pub async fn handle_event(&self, event: &SyncEvent) -> Result<()> {
        match event {
            SyncEvent::SyncStart { .. } => {
                self.status_tx.send_modify(|status| status.syncing = true);
            }
            SyncEvent::SyncComplete { .. } => {
                self.status_tx.send_modify(|status| {
                    status.syncing = false;
                    status.last_sync = Some(Utc::now());
                });
                self.refresh().await?;
            }
            SyncEvent::PhotoUploaded { .. } | SyncEvent::ActionSynced { .. } => {
                self.refresh().await?;
            }
            SyncEvent::PhotoFailed { .. }
            | SyncEvent::ActionFailed { .. }
            | SyncEvent::ActionParked { .. } => {}
        }
        Ok(())
    }

    /// Keeps the status current until cancelled
    ///
    /// Listens to manager events and connectivity changes, and refreshes
    /// the pending count every `interval`.
    pub async fn run(
        &self,
        monitor: &ConnectivityMonitor,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        let mut events = self.manager.subscribe();
        let mut online_rx = monitor.subscribe();
        let mut ticker = tokio::time::interval(interval);

        info!(interval_secs = interval.as_secs(), "Status aggregator starting");

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.refresh().await,
                changed = online_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let online = *online_rx.borrow_and_update();
                    self.status_tx.send_if_modified(|status| {
                        let changed = status.online != online;
                        status.online = online;
                        changed
                    });
                    Ok(())
                }
                event = events.recv() => match event {
                    Ok(event) => self.handle_event(&event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Status aggregator lagged behind events");
                        self.refresh().await
                    }
                    Err(RecvError::Closed) => break,
                },
            };

            if let Err(e) = result {
                warn!(error = %format!("{e:#}"), "Failed to refresh sync status");
            }
        }

        info!("Status aggregator stopped");
    }
}
