//! Status command - Show pending work and connectivity
//!
//! Provides the `verdiplan status` CLI command which:
//! 1. Counts pending photos and queued actions (parked ones separately)
//! 2. Probes the API host
//! 3. Lists the pending items when `--list` is given

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use serde_json::json;

use verdiplan_core::ports::{IOfflineStore, IRemoteApi};
use verdiplan_sync::{ConnectivityState, SyncQueueManager};

use super::AppContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// List every pending photo and queued action
    #[arg(long)]
    pub list: bool,

    /// Skip the API reachability probe
    #[arg(long)]
    pub offline: bool,
}

impl StatusCommand {
    pub async fn execute(&self, config: Option<&Path>, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let ctx = AppContext::open(config).await?;
        let api = ctx.api()?;

        let online = if self.offline {
            None
        } else {
            Some(api.ping().await.is_ok())
        };

        let manager = SyncQueueManager::new(
            Arc::clone(&ctx.store) as Arc<dyn IOfflineStore>,
            api,
            ConnectivityState::new(online.unwrap_or(false)),
            ctx.config.sync.max_action_attempts,
        );
        let stats = manager.get_stats().await?;

        let media = if self.list {
            ctx.store.list_pending_media(None).await?
        } else {
            Vec::new()
        };
        let queue = if self.list {
            ctx.store.list_queue().await?
        } else {
            Vec::new()
        };
        let max_attempts = ctx.config.sync.max_action_attempts;

        if format.is_json() {
            let mut value = json!({
                "online": online,
                "stats": stats,
            });
            if self.list {
                value["media"] = serde_json::to_value(&media)?;
                value["queue"] = queue
                    .iter()
                    .map(|item| {
                        json!({
                            "item": item,
                            "parked": item.is_parked(max_attempts),
                        })
                    })
                    .collect();
            }
            formatter.print_json(&value);
        } else {
            match online {
                Some(true) => formatter.success("API reachable"),
                Some(false) => formatter.warn("API unreachable, working offline"),
                None => {}
            }
            formatter.field("Pending photos", &stats.pending_photos.to_string());
            formatter.field("Queued actions", &stats.pending_actions.to_string());
            if stats.parked_actions > 0 {
                formatter.field("Parked actions", &stats.parked_actions.to_string());
            }
            formatter.field("Total pending", &stats.total.to_string());

            if self.list {
                for m in &media {
                    formatter.info(&format!(
                        "{} ({} bytes, captured {})",
                        m.media_ref(),
                        m.byte_size,
                        m.captured_at.format("%Y-%m-%d %H:%M")
                    ));
                }
                for item in &queue {
                    let mut line = format!("#{} {} (attempts: {})", item.id, item.action, item.attempt_count);
                    if item.is_parked(max_attempts) {
                        line.push_str(" [parked]");
                    }
                    formatter.info(&line);
                    if let Some(err) = &item.last_error {
                        formatter.info(&format!("    last error: {err}"));
                    }
                }
            }
        }

        ctx.close().await;
        Ok(())
    }
}
