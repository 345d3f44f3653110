//! Capture command - Store a photo for later upload
//!
//! Provides the `verdiplan capture <task> <file>` CLI command. The file is
//! copied into the offline store; the next sync pass uploads it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use verdiplan_core::domain::{MediaContent, TaskId};
use verdiplan_core::ports::IOfflineStore;

use super::{parse_key_values, AppContext};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct CaptureCommand {
    /// Task the photo belongs to
    pub task: String,

    /// Image file to store
    pub file: PathBuf,

    /// MIME type (guessed from the file extension when omitted)
    #[arg(long)]
    pub mime: Option<String>,

    /// Metadata entries (repeatable), e.g. --meta lat=-23.5
    #[arg(long = "meta", value_name = "KEY=VALUE")]
    pub meta: Vec<String>,
}

impl CaptureCommand {
    pub async fn execute(&self, config: Option<&Path>, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let task_id = TaskId::new(&self.task)?;
        let metadata = parse_key_values(&self.meta)?;
        let bytes = tokio::fs::read(&self.file)
            .await
            .with_context(|| format!("Failed to read {}", self.file.display()))?;
        let filename = self
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("No file name in {}", self.file.display()))?;

        let content = MediaContent::new(filename, self.mime.clone().unwrap_or_default(), bytes)?;
        let size = content.byte_size();
        let mime = content.mime_type().to_string();

        let ctx = AppContext::open(config).await?;
        let id = ctx.store.add_media(&task_id, content, metadata).await?;
        let pending = ctx.store.count_pending_media().await?;

        if format.is_json() {
            formatter.print_json(&json!({
                "id": id,
                "task_id": task_id,
                "mime_type": mime,
                "byte_size": size,
                "pending_photos": pending,
            }));
        } else {
            formatter.success(&format!("Stored photo #{id} for task {task_id} ({size} bytes, {mime})"));
            formatter.info(&format!("{pending} photo(s) waiting for upload"));
        }

        ctx.close().await;
        Ok(())
    }
}
