//! Notification service port (driven/secondary port)
//!
//! Interface for surfacing local notifications raised by the interception
//! layer: background-sync notices and push messages. Implementations may
//! use the desktop notification service, a log sink, or anything else.
//!
//! ## Design Notes
//!
//! - Notifications are fire-and-forget; the caller does not wait for
//!   user interaction.
//! - `data` is opaque to the service and is handed back when the user
//!   activates the notification.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Notification struct and NotificationPriority enum
// ============================================================================

/// Priority level for a notification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    #[default]
    Normal,
    High,
}

impl std::fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationPriority::Low => "low",
            NotificationPriority::Normal => "normal",
            NotificationPriority::High => "high",
        };
        write!(f, "{}", s)
    }
}

/// A notification to display to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Title of the notification (short, descriptive)
    pub title: String,
    /// Body text
    pub body: String,
    pub priority: NotificationPriority,
    /// Category for grouping, e.g. "sync" or "push"
    pub category: String,
    /// Icon path relative to the app origin
    pub icon: Option<String>,
    /// Monochrome badge path relative to the app origin
    pub badge: Option<String>,
    /// Payload returned on activation; `data.url` selects the page to open
    #[serde(default)]
    pub data: Value,
}

impl Notification {
    /// Creates a new notification with the given title and body
    ///
    /// Uses `Normal` priority, an empty category and no data by default.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            priority: NotificationPriority::Normal,
            category: String::new(),
            icon: None,
            badge: None,
            data: Value::Null,
        }
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Sets both the icon and the badge to the same image
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        let icon = icon.into();
        self.badge = Some(icon.clone());
        self.icon = Some(icon);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Creates a sync-related notification
    pub fn sync(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body).with_category("sync")
    }

    /// Creates a notification for an incoming push message
    pub fn push(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body)
            .with_priority(NotificationPriority::High)
            .with_category("push")
    }

    /// Target URL carried in `data.url`, if any
    pub fn target_url(&self) -> Option<&str> {
        self.data.get("url").and_then(Value::as_str)
    }
}

// ============================================================================
// INotificationService trait
// ============================================================================

/// Port trait for local notifications
#[async_trait::async_trait]
pub trait INotificationService: Send + Sync {
    /// Shows a notification to the user
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}

// ============================================================================
// IClientLauncher trait
// ============================================================================

/// Port trait for focusing or opening an application window
#[async_trait::async_trait]
pub trait IClientLauncher: Send + Sync {
    /// Opens the application at `url`, focusing an existing window if the
    /// platform allows it
    async fn open_window(&self, url: &str) -> anyhow::Result<()>;
}
