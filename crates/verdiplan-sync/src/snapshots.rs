//! Task list with offline fallback
//!
//! Fetches the remote task list and replaces the local snapshot set with
//! it. When the remote is unreachable the last stored snapshots are
//! served instead.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use verdiplan_core::ports::{IOfflineStore, IRemoteApi};

/// Where a task list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    Remote,
    Snapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskList {
    pub source: TaskSource,
    pub tasks: Vec<Value>,
}

pub struct SnapshotService {
    store: Arc<dyn IOfflineStore>,
    api: Arc<dyn IRemoteApi>,
}

impl SnapshotService {
    pub fn new(store: Arc<dyn IOfflineStore>, api: Arc<dyn IRemoteApi>) -> Self {
        Self { store, api }
    }

    /// Fetches the remote list and replaces the stored snapshots
    ///
    /// Returns the number of snapshots written. Fails if the remote call
    /// fails or the list is rejected by the store; the previous snapshot
    /// set is then left untouched.
    pub async fn refresh(&self) -> Result<usize> {
        let tasks = self.api.list_tasks().await.context("Failed to fetch tasks")?;
        let count = self
            .store
            .replace_all_snapshots(tasks)
            .await
            .context("Failed to store task snapshots")?;
        info!(count, "Task snapshots refreshed");
        Ok(count)
    }

    /// Returns the remote list if reachable, the stored snapshots otherwise
    pub async fn load_tasks(&self) -> Result<TaskList> {
        match self.api.list_tasks().await {
            Ok(tasks) => {
                if let Err(e) = self.store.replace_all_snapshots(tasks.clone()).await {
                    warn!(error = %format!("{e:#}"), "Fetched tasks could not be cached");
                }
                Ok(TaskList {
                    source: TaskSource::Remote,
                    tasks,
                })
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Task list unavailable, using snapshots");
                let tasks = self
                    .store
                    .list_snapshots()
                    .await?
                    .into_iter()
                    .map(|snapshot| snapshot.fields)
                    .collect();
                Ok(TaskList {
                    source: TaskSource::Snapshot,
                    tasks,
                })
            }
        }
    }
}
