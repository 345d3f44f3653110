//! Queue commands - Record task changes for later replay
//!
//! Provides the `verdiplan queue` CLI subcommands:
//! 1. `create` - queue a task creation
//! 2. `update` - queue a change to an existing task
//! 3. `list`   - show queued actions with attempts and last error
//! 4. `remove` - drop one queued action
//! 5. `clear`  - drop every queued action

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::{json, Value};

use verdiplan_core::domain::{QueueAction, QueueItemId, TaskId};
use verdiplan_core::ports::IOfflineStore;

use super::{parse_key_values, AppContext};
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    /// Queue a task creation
    Create {
        /// JSON object with the task fields
        #[arg(long, conflicts_with = "set")]
        payload: Option<String>,
        /// Task fields as KEY=VALUE (repeatable)
        #[arg(long)]
        set: Vec<String>,
    },
    /// Queue an update of an existing task
    Update {
        /// Remote id of the task
        id: String,
        /// JSON object with the changed fields
        #[arg(long, conflicts_with = "set")]
        payload: Option<String>,
        /// Changed fields as KEY=VALUE (repeatable)
        #[arg(long)]
        set: Vec<String>,
    },
    /// List queued actions in replay order
    List,
    /// Remove one queued action
    Remove {
        /// Queue item id as shown by `queue list`
        id: QueueItemId,
    },
    /// Remove every queued action
    Clear {
        /// Required to confirm
        #[arg(long)]
        yes: bool,
    },
}

impl QueueCommand {
    pub async fn execute(&self, config: Option<&Path>, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let ctx = AppContext::open(config).await?;

        let result = match self {
            QueueCommand::Create { payload, set } => {
                let action = QueueAction::EntityCreate {
                    payload: build_payload(payload.as_deref(), set)?,
                };
                enqueue(&ctx, action, format, &*formatter).await
            }
            QueueCommand::Update { id, payload, set } => {
                let action = QueueAction::EntityUpdate {
                    id: TaskId::new(id)?,
                    payload: build_payload(payload.as_deref(), set)?,
                };
                enqueue(&ctx, action, format, &*formatter).await
            }
            QueueCommand::List => list(&ctx, format, &*formatter).await,
            QueueCommand::Remove { id } => {
                let removed = ctx.store.dequeue(*id).await?;
                if format.is_json() {
                    formatter.print_json(&json!({ "id": id, "removed": removed }));
                } else if removed {
                    formatter.success(&format!("Removed action #{id}"));
                } else {
                    formatter.warn(&format!("No queued action #{id}"));
                }
                Ok(())
            }
            QueueCommand::Clear { yes } => {
                if !yes {
                    formatter.error("Refusing to drop queued actions without --yes");
                } else {
                    let removed = ctx.store.clear_queue().await?;
                    if format.is_json() {
                        formatter.print_json(&json!({ "removed": removed }));
                    } else {
                        formatter.success(&format!("Removed {removed} queued action(s)"));
                    }
                }
                Ok(())
            }
        };

        ctx.close().await;
        result
    }
}

/// Builds the payload object from `--payload` JSON or `--set` pairs
fn build_payload(payload: Option<&str>, set: &[String]) -> Result<Value> {
    let value = match payload {
        Some(raw) => serde_json::from_str(raw).context("--payload is not valid JSON")?,
        None => Value::Object(parse_key_values(set)?),
    };
    if !value.is_object() {
        anyhow::bail!("The payload must be a JSON object");
    }
    Ok(value)
}

async fn enqueue(
    ctx: &AppContext,
    action: QueueAction,
    format: OutputFormat,
    formatter: &dyn OutputFormatter,
) -> Result<()> {
    let item = ctx.store.enqueue(action).await?;
    if format.is_json() {
        formatter.print_json(&serde_json::to_value(&item)?);
    } else {
        formatter.success(&format!("Queued #{} {}", item.id, item.action));
        formatter.field("Idempotency key", &item.idempotency_key.to_string());
    }
    Ok(())
}

async fn list(ctx: &AppContext, format: OutputFormat, formatter: &dyn OutputFormatter) -> Result<()> {
    let queue = ctx.store.list_queue().await?;
    let max_attempts = ctx.config.sync.max_action_attempts;

    if format.is_json() {
        formatter.print_json(&serde_json::to_value(&queue)?);
        return Ok(());
    }

    if queue.is_empty() {
        formatter.success("Queue is empty");
        return Ok(());
    }

    formatter.success(&format!("{} queued action(s)", queue.len()));
    for item in &queue {
        let parked = if item.is_parked(max_attempts) { " [parked]" } else { "" };
        formatter.info(&format!(
            "#{} {} queued {} attempts {}{}",
            item.id,
            item.action,
            item.enqueued_at.format("%Y-%m-%d %H:%M"),
            item.attempt_count,
            parked
        ));
        if let Some(err) = &item.last_error {
            formatter.info(&format!("    last error: {err}"));
        }
    }
    Ok(())
}
