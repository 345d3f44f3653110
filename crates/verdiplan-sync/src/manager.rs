//! Sync queue manager
//!
//! Drains the offline store against the remote API. A pass uploads every
//! pending media row first, then replays the action queue. At most one
//! pass runs at a time; a trigger during a pass, or while offline, is a
//! no-op.
//!
//! Within a process the syncing flag enforces this. Across processes
//! sharing one store (the daemon and `verdiplan sync`) a store-wide lease
//! does: a pass holds it from start to finish and renews it before every
//! item. A process that dies mid-pass leaves the lease to expire after
//! [`LEASE_TTL`].
//!
//! ```text
//!            sync_all()                 pass finished / panicked
//!   ┌──────┐ ──────────► ┌─────────┐ ────────────────────────► ┌──────┐
//!   │ Idle │             │ Syncing │                           │ Idle │
//!   └──────┘             └─────────┘                           └──────┘
//!                          │  ▲
//!            sync_all() ───┘  └── AlreadySyncing
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use verdiplan_core::domain::{PendingMedia, QueueAction, SyncQueueItem};
use verdiplan_core::ports::{IOfflineStore, IRemoteApi};

use crate::connectivity::ConnectivityState;
use crate::events::{self, Progress, SyncEvent};

/// Lifetime of the store-wide sync lease; renewed before every item
pub const LEASE_TTL: Duration = Duration::from_secs(600);

// ============================================================================
// Results
// ============================================================================

/// Counters of a completed pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub photos_uploaded: usize,
    pub photos_failed: usize,
    pub actions_synced: usize,
    pub actions_failed: usize,
    pub actions_parked: usize,
    pub duration_ms: u64,
}

impl SyncReport {
    /// Returns true if every attempted item succeeded
    pub fn is_clean(&self) -> bool {
        self.photos_failed == 0 && self.actions_failed == 0
    }
}

/// What a call to [`SyncQueueManager::sync_all`] did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Another pass was already running, in this process or another one
    /// sharing the store; nothing was done
    AlreadySyncing,
    /// The device is offline; nothing was done
    Offline,
    /// A pass ran to completion
    Completed(SyncReport),
}

/// Pending work counts, for reporting only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending_photos: u64,
    /// Every queued action, parked ones included
    pub pending_actions: u64,
    /// Queued actions that ran out of attempts
    pub parked_actions: u64,
    /// `pending_photos + pending_actions`
    pub total: u64,
}

// ============================================================================
// SyncingGuard
// ============================================================================

/// Holds the syncing flag for the lifetime of a pass
///
/// Dropping the guard releases the flag, including on early return and
/// during panic unwinding.
struct SyncingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SyncingGuard<'a> {
    /// Acquires the flag, or returns `None` if it is already held
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// ============================================================================
// SyncQueueManager
// ============================================================================

/// Replays offline work against the remote API
pub struct SyncQueueManager {
    store: Arc<dyn IOfflineStore>,
    api: Arc<dyn IRemoteApi>,
    connectivity: ConnectivityState,
    events: broadcast::Sender<SyncEvent>,
    syncing: AtomicBool,
    /// Owner name of the store-wide sync lease
    lease_holder: String,
    /// Attempts after which a queued action is parked; 0 means unlimited
    max_action_attempts: u32,
}

impl SyncQueueManager {
    /// Creates a new manager
    ///
    /// # Arguments
    /// * `store` - The offline store holding pending work
    /// * `api` - The remote API
    /// * `connectivity` - Shared online flag; passes only run while online
    /// * `max_action_attempts` - Attempts before an action is parked (0 = unlimited)
    pub fn new(
        store: Arc<dyn IOfflineStore>,
        api: Arc<dyn IRemoteApi>,
        connectivity: ConnectivityState,
        max_action_attempts: u32,
    ) -> Self {
        Self {
            store,
            api,
            connectivity,
            events: events::channel(),
            syncing: AtomicBool::new(false),
            lease_holder: format!("{}-{}", std::process::id(), Uuid::new_v4()),
            max_action_attempts,
        }
    }

    /// Subscribes to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Returns true while a pass is running
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    pub fn connectivity(&self) -> &ConnectivityState {
        &self.connectivity
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Runs one pass over all pending work
    ///
    /// Remote failures are recorded per item and never escape. Only a
    /// failure to read the store or to hold the sync lease aborts the pass
    /// with an error.
    #[tracing::instrument(skip(self))]
    pub async fn sync_all(&self) -> Result<SyncOutcome> {
        let Some(_guard) = SyncingGuard::acquire(&self.syncing) else {
            info!("Sync already in progress, ignoring trigger");
            return Ok(SyncOutcome::AlreadySyncing);
        };

        if !self.connectivity.is_online() {
            info!("Device offline, waiting for connectivity");
            return Ok(SyncOutcome::Offline);
        }

        let acquired = self
            .store
            .try_acquire_sync_lease(&self.lease_holder, LEASE_TTL)
            .await
            .context("Failed to claim sync lease")?;
        if !acquired {
            info!("Another process is syncing this store, ignoring trigger");
            return Ok(SyncOutcome::AlreadySyncing);
        }

        let start = Instant::now();
        let mut report = SyncReport::default();

        let result = self.run_pass(&mut report).await;
        if let Err(e) = self.store.release_sync_lease(&self.lease_holder).await {
            warn!(error = %format!("{e:#}"), "Failed to release sync lease");
        }
        result?;

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            photos_uploaded = report.photos_uploaded,
            photos_failed = report.photos_failed,
            actions_synced = report.actions_synced,
            actions_failed = report.actions_failed,
            actions_parked = report.actions_parked,
            duration_ms = report.duration_ms,
            "Sync pass finished"
        );

        Ok(SyncOutcome::Completed(report))
    }

    async fn run_pass(&self, report: &mut SyncReport) -> Result<()> {
        self.sync_media(report).await?;
        self.sync_actions(report).await
    }

    /// Extends the sync lease; fails if another process took it over
    async fn renew_lease(&self) -> Result<()> {
        let held = self
            .store
            .try_acquire_sync_lease(&self.lease_holder, LEASE_TTL)
            .await
            .context("Failed to renew sync lease")?;
        if !held {
            anyhow::bail!("Sync lease was taken over by another process");
        }
        Ok(())
    }

    /// Uploads every pending media row, independently of each other
    async fn sync_media(&self, report: &mut SyncReport) -> Result<()> {
        let pending = self
            .store
            .list_pending_media(None)
            .await
            .context("Failed to read pending media")?;

        if pending.is_empty() {
            debug!("No pending media");
            return Ok(());
        }

        let total = pending.len();
        info!(count = total, "Uploading pending media");
        self.emit(SyncEvent::SyncStart { count: total });

        for media in &pending {
            self.renew_lease().await?;
            let result = self.upload_one(media).await;
            let progress = Progress {
                current: report.photos_uploaded + report.photos_failed + 1,
                total,
            };

            match result {
                Ok(()) => {
                    report.photos_uploaded += 1;
                    debug!(media_id = %media.id, task_id = %media.task_id, "Media uploaded");
                    self.emit(SyncEvent::PhotoUploaded {
                        photo: media.media_ref(),
                        progress,
                    });
                }
                Err(err) => {
                    report.photos_failed += 1;
                    warn!(media_id = %media.id, task_id = %media.task_id, error = %format!("{err:#}"), "Media upload failed");
                    self.emit(SyncEvent::PhotoFailed {
                        photo: media.media_ref(),
                        error: format!("{err:#}"),
                        progress,
                    });
                }
            }
        }

        self.emit(SyncEvent::SyncComplete {
            success: report.photos_uploaded,
            failed: report.photos_failed,
        });
        Ok(())
    }

    async fn upload_one(&self, media: &PendingMedia) -> Result<()> {
        self.api.upload_media(media).await?;
        self.store
            .mark_media_uploaded(media.id)
            .await
            .context("Uploaded but could not mark as uploaded")
    }

    /// Replays the action queue in insertion order
    async fn sync_actions(&self, report: &mut SyncReport) -> Result<()> {
        let queue = self
            .store
            .list_queue()
            .await
            .context("Failed to read action queue")?;

        if queue.is_empty() {
            return Ok(());
        }
        info!(count = queue.len(), "Replaying queued actions");

        for item in &queue {
            self.renew_lease().await?;
            if item.is_parked(self.max_action_attempts) {
                report.actions_parked += 1;
                debug!(queue_id = %item.id, attempts = item.attempt_count, "Skipping parked action");
                self.emit(SyncEvent::ActionParked {
                    item: item.id,
                    attempts: item.attempt_count,
                });
                continue;
            }

            match self.replay_one(item).await {
                Ok(()) => {
                    report.actions_synced += 1;
                    debug!(queue_id = %item.id, action = %item.action, "Action synced");
                    self.emit(SyncEvent::ActionSynced {
                        item: item.id,
                        kind: item.action.kind().to_string(),
                    });
                }
                Err(err) => {
                    report.actions_failed += 1;
                    let message = format!("{err:#}");
                    warn!(queue_id = %item.id, action = %item.action, error = %message, "Action failed");

                    if let Err(record_err) =
                        self.store.record_attempt_failure(item.id, &message).await
                    {
                        warn!(queue_id = %item.id, error = %record_err, "Failed to record attempt");
                    }

                    self.emit(SyncEvent::ActionFailed {
                        item: item.id,
                        error: message,
                        attempts: item.attempt_count.saturating_add(1),
                    });
                }
            }
        }

        Ok(())
    }

    async fn replay_one(&self, item: &SyncQueueItem) -> Result<()> {
        match &item.action {
            QueueAction::EntityCreate { payload } => {
                self.api.create_task(payload, &item.idempotency_key).await?;
            }
            QueueAction::EntityUpdate { id, payload } => {
                self.api
                    .update_task(id, payload, &item.idempotency_key)
                    .await?;
            }
        }

        self.store
            .dequeue(item.id)
            .await
            .context("Acknowledged but could not dequeue")?;
        Ok(())
    }

    /// Counts pending work
    pub async fn get_stats(&self) -> Result<QueueStats> {
        let pending_photos = self.store.count_pending_media().await?;
        let queue = self.store.list_queue().await?;
        let parked_actions = queue
            .iter()
            .filter(|item| item.is_parked(self.max_action_attempts))
            .count() as u64;
        let pending_actions = queue.len() as u64;

        Ok(QueueStats {
            pending_photos,
            pending_actions,
            parked_actions,
            total: pending_photos + pending_actions,
        })
    }
}
