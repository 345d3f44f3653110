//! Desktop adapters for the notification and launcher ports

use anyhow::Context;
use tracing::info;

use verdiplan_core::ports::{IClientLauncher, INotificationService, Notification};

/// Surfaces notifications through the log
pub struct LogNotifier;

#[async_trait::async_trait]
impl INotificationService for LogNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        info!(
            title = %notification.title,
            body = %notification.body,
            priority = %notification.priority,
            category = %notification.category,
            url = notification.target_url().unwrap_or_default(),
            "Notification"
        );
        Ok(())
    }
}

/// Opens the application in the default browser
pub struct BrowserLauncher;

#[async_trait::async_trait]
impl IClientLauncher for BrowserLauncher {
    async fn open_window(&self, url: &str) -> anyhow::Result<()> {
        let target = url.to_string();
        tokio::task::spawn_blocking(move || webbrowser::open(&target))
            .await
            .context("Browser launcher task failed")?
            .with_context(|| format!("Failed to open {url}"))?;
        info!(url, "Opened application window");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_accepts_everything() {
        let n = Notification::push("Verdiplan", "New notification");
        assert!(LogNotifier.notify(&n).await.is_ok());
    }
}
