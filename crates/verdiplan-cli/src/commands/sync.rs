//! Sync command - Run one sync pass now
//!
//! Provides the `verdiplan sync` CLI command which:
//! 1. Opens the offline store and builds the API client
//! 2. Probes the API host (skipped with `--assume-online`)
//! 3. Runs a pass, printing progress as events arrive
//! 4. Prints the pass report

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

use verdiplan_core::ports::{IOfflineStore, IRemoteApi};
use verdiplan_sync::{ConnectivityState, SyncEvent, SyncOutcome, SyncQueueManager};

use super::AppContext;
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Skip the reachability probe and attempt the pass anyway
    #[arg(long)]
    pub assume_online: bool,
}

impl SyncCommand {
    pub async fn execute(&self, config: Option<&Path>, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let ctx = AppContext::open(config).await?;
        let api = ctx.api()?;

        let online = self.assume_online || api.ping().await.is_ok();
        info!(online, "Connectivity checked");

        let manager = SyncQueueManager::new(
            Arc::clone(&ctx.store) as Arc<dyn IOfflineStore>,
            api,
            ConnectivityState::new(online),
            ctx.config.sync.max_action_attempts,
        );

        let mut events = manager.subscribe();
        let outcome = if format.is_json() {
            manager.sync_all().await?
        } else {
            let pass = manager.sync_all();
            tokio::pin!(pass);
            loop {
                tokio::select! {
                    outcome = &mut pass => break outcome?,
                    event = events.recv() => match event {
                        Ok(event) => print_event(&event, &*formatter),
                        Err(RecvError::Lagged(_)) => {}
                        Err(RecvError::Closed) => {}
                    },
                }
            }
        };

        // Events emitted right before the pass returned
        while let Ok(event) = events.try_recv() {
            if !format.is_json() {
                print_event(&event, &*formatter);
            }
        }

        match &outcome {
            SyncOutcome::Offline => formatter.warn("API unreachable, nothing was sent"),
            SyncOutcome::AlreadySyncing => {
                formatter.warn("A sync pass is already running (here or in the daemon)")
            }
            SyncOutcome::Completed(report) => {
                if format.is_json() {
                    formatter.print_json(&json!({ "outcome": outcome }));
                } else if report.is_clean() {
                    formatter.success(&format!(
                        "Sync completed: {} photo(s) uploaded, {} action(s) sent in {}ms",
                        report.photos_uploaded, report.actions_synced, report.duration_ms
                    ));
                } else {
                    formatter.warn(&format!(
                        "Sync completed with failures: {} photo(s) and {} action(s) will be retried",
                        report.photos_failed, report.actions_failed
                    ));
                }
                if report.actions_parked > 0 {
                    formatter.warn(&format!(
                        "{} action(s) are parked after too many attempts; see 'verdiplan status --list'",
                        report.actions_parked
                    ));
                }
            }
        }
        if format.is_json() && !matches!(outcome, SyncOutcome::Completed(_)) {
            formatter.print_json(&json!({ "outcome": outcome }));
        }

        ctx.close().await;
        Ok(())
    }
}

fn print_event(event: &SyncEvent, formatter: &dyn OutputFormatter) {
    match event {
        SyncEvent::SyncStart { count } => formatter.info(&format!("Uploading {count} photo(s)...")),
        SyncEvent::PhotoUploaded { photo, progress } => {
            formatter.info(&format!("[{}/{}] {photo}", progress.current, progress.total))
        }
        SyncEvent::PhotoFailed {
            photo,
            error,
            progress,
        } => formatter.info(&format!(
            "[{}/{}] {photo} failed: {error}",
            progress.current, progress.total
        )),
        SyncEvent::SyncComplete { success, failed } => {
            formatter.info(&format!("Photos: {success} uploaded, {failed} failed"))
        }
        SyncEvent::ActionSynced { item, kind } => formatter.info(&format!("Action #{item} ({kind}) sent")),
        SyncEvent::ActionFailed {
            item,
            error,
            attempts,
        } => formatter.info(&format!("Action #{item} failed (attempt {attempts}): {error}")),
        SyncEvent::ActionParked { item, attempts } => {
            formatter.info(&format!("Action #{item} parked after {attempts} attempts"))
        }
    }
}
