//! Cleanup command - Delete uploaded media past the retention period
//!
//! Rows that are still pending are never touched.

use std::path::Path;

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::Args;
use serde_json::json;

use verdiplan_core::ports::IOfflineStore;

use super::AppContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct CleanupCommand {
    /// Keep uploaded media younger than this many days
    /// (default: sync.uploaded_retention_days)
    #[arg(long)]
    pub older_than_days: Option<u32>,
}

impl CleanupCommand {
    pub async fn execute(&self, config: Option<&Path>, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let ctx = AppContext::open(config).await?;

        let days = self
            .older_than_days
            .unwrap_or(ctx.config.sync.uploaded_retention_days);
        let cutoff = Utc::now() - Duration::days(i64::from(days));

        let removed = ctx.store.purge_uploaded_media(cutoff).await?;

        if format.is_json() {
            formatter.print_json(&json!({
                "removed": removed,
                "older_than_days": days,
                "cutoff": cutoff,
            }));
        } else if removed == 0 {
            formatter.success(&format!("Nothing uploaded more than {days} day(s) ago"));
        } else {
            formatter.success(&format!(
                "Removed {removed} uploaded photo(s) older than {days} day(s)"
            ));
        }

        ctx.close().await;
        Ok(())
    }
}
