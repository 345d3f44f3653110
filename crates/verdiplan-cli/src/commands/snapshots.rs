//! Snapshot commands - Cached copy of the remote task list
//!
//! Provides the `verdiplan snapshots` CLI subcommands:
//! 1. `refresh` - fetch the task list and replace the cached copy
//! 2. `list`    - show the task list, falling back to the cache when offline
//! 3. `show`    - print one cached task

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Subcommand;
use serde_json::{json, Value};

use verdiplan_core::domain::TaskId;
use verdiplan_core::ports::IOfflineStore;
use verdiplan_sync::{SnapshotService, TaskSource};

use super::AppContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum SnapshotsCommand {
    /// Fetch the remote task list and replace the cached copy
    Refresh,
    /// Show tasks from the API, or from the cache when offline
    List {
        /// Read the cache without contacting the API
        #[arg(long)]
        cached: bool,
    },
    /// Print one cached task
    Show {
        /// Remote id of the task
        id: String,
    },
}

impl SnapshotsCommand {
    pub async fn execute(&self, config: Option<&Path>, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let ctx = AppContext::open(config).await?;
        let service = SnapshotService::new(
            Arc::clone(&ctx.store) as Arc<dyn IOfflineStore>,
            ctx.api()?,
        );

        match self {
            SnapshotsCommand::Refresh => {
                let count = service.refresh().await?;
                if format.is_json() {
                    formatter.print_json(&json!({ "stored": count }));
                } else {
                    formatter.success(&format!("Cached {count} task(s)"));
                }
            }
            SnapshotsCommand::List { cached } => {
                let (source, tasks) = if *cached {
                    let tasks = ctx
                        .store
                        .list_snapshots()
                        .await?
                        .into_iter()
                        .map(|s| s.fields)
                        .collect();
                    (TaskSource::Snapshot, tasks)
                } else {
                    let list = service.load_tasks().await?;
                    (list.source, list.tasks)
                };

                if format.is_json() {
                    formatter.print_json(&json!({ "source": source, "tasks": tasks }));
                } else {
                    if source == TaskSource::Snapshot {
                        formatter.warn("Showing cached tasks");
                    }
                    formatter.success(&format!("{} task(s)", tasks.len()));
                    for task in &tasks {
                        formatter.info(&summary(task));
                    }
                }
            }
            SnapshotsCommand::Show { id } => {
                let id = TaskId::new(id)?;
                match ctx.store.get_snapshot(&id).await? {
                    Some(snapshot) if format.is_json() => {
                        formatter.print_json(&serde_json::to_value(&snapshot)?)
                    }
                    Some(snapshot) => {
                        formatter.success(&format!(
                            "Task {} (cached {})",
                            snapshot.id,
                            snapshot.cached_at.format("%Y-%m-%d %H:%M")
                        ));
                        let pretty = serde_json::to_string_pretty(&snapshot.fields)?;
                        for line in pretty.lines() {
                            formatter.info(line);
                        }
                    }
                    None => formatter.error(&format!("No cached task with id {id}")),
                }
            }
        }

        ctx.close().await;
        Ok(())
    }
}

/// One-line description of a task object
fn summary(task: &Value) -> String {
    let id = match task.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "?".to_string(),
    };
    let title = task
        .get("title")
        .or_else(|| task.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("(untitled)");
    match task.get("status").and_then(Value::as_str) {
        Some(status) => format!("{id}  {title}  [{status}]"),
        None => format!("{id}  {title}"),
    }
}
