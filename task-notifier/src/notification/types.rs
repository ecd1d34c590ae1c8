//! Notification record and its enums.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

static NEXT_NOTIFICATION_ID: AtomicU64 = AtomicU64::new(1);

/// Delivery channel of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Email,
    InApp,
    Sms,
    Webhook,
    Slack,
    Discord,
}

impl NotificationType {
    pub const ALL: [NotificationType; 6] = [
        Self::Email,
        Self::InApp,
        Self::Sms,
        Self::Webhook,
        Self::Slack,
        Self::Discord,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::InApp => "in_app",
            Self::Sms => "sms",
            Self::Webhook => "webhook",
            Self::Slack => "slack",
            Self::Discord => "discord",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority level for notifications.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    /// Low priority - informational only.
    Low,
    /// Normal priority - standard notifications.
    #[default]
    Normal,
    /// High priority - important events.
    High,
    /// Critical priority - requires immediate attention.
    Critical,
}

impl std::fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Why a notification exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTrigger {
    DueDate,
    Overdue,
    StatusChange,
    Created,
    Updated,
    Custom,
}

impl std::fmt::Display for NotificationTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DueDate => write!(f, "due_date"),
            Self::Overdue => write!(f, "overdue"),
            Self::StatusChange => write!(f, "status_change"),
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// Delivery state.
///
/// `Pending -> Sent -> Delivered` on success, `Pending -> Failed` or
/// `Pending -> Cancelled` otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    #[default]
    Pending,
    Sent,
    Delivered,
    Failed,
    Cancelled,
}

impl NotificationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Sent => write!(f, "sent"),
            Self::Delivered => write!(f, "delivered"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A unit of delivery work.
///
/// Exactly one owner holds a notification at a time: the caller, the queue,
/// the deferred heap, or the worker delivering it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub user_id: i64,
    pub task_id: i64,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub priority: NotificationPriority,
    pub trigger: NotificationTrigger,
    pub status: NotificationStatus,
    pub title: String,
    pub message: String,
    /// Address for email/SMS.
    pub recipient: String,
    /// Destination for webhook/chat channels (URL or channel name).
    pub channel: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub retry_count: u32,
    /// `None` takes the service default on submission.
    pub max_retries: Option<u32>,
    /// Last failure, cleared on success.
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Notification {
    /// Create a pending notification with a fresh id.
    pub fn new(kind: NotificationType, trigger: NotificationTrigger) -> Self {
        let now = Utc::now();
        Self {
            id: NEXT_NOTIFICATION_ID.fetch_add(1, Ordering::Relaxed),
            user_id: 0,
            task_id: 0,
            kind,
            priority: NotificationPriority::Normal,
            trigger,
            status: NotificationStatus::Pending,
            title: String::new(),
            message: String::new(),
            recipient: String::new(),
            channel: String::new(),
            scheduled_at: None,
            sent_at: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
            retry_count: 0,
            max_retries: None,
            error: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn for_task(mut self, user_id: i64, task_id: i64) -> Self {
        self.user_id = user_id;
        self.task_id = task_id;
        self
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_content(mut self, title: impl Into<String>, message: impl Into<String>) -> Self {
        self.title = title.into();
        self.message = message.into();
        self
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = recipient.into();
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Retry budget, zero when no default has been applied yet.
    pub fn retry_budget(&self) -> u32 {
        self.max_retries.unwrap_or(0)
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    pub(crate) fn mark_sent(&mut self, now: DateTime<Utc>) {
        self.status = NotificationStatus::Sent;
        self.sent_at = Some(now);
        self.error = None;
        self.touch(now);
    }

    pub(crate) fn mark_delivered(&mut self, now: DateTime<Utc>) {
        self.status = NotificationStatus::Delivered;
        self.delivered_at = Some(now);
        self.touch(now);
    }

    pub(crate) fn mark_failed(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.status = NotificationStatus::Failed;
        self.error = Some(error.into());
        self.touch(now);
    }

    pub(crate) fn mark_cancelled(&mut self, now: DateTime<Utc>) {
        self.status = NotificationStatus::Cancelled;
        self.touch(now);
    }
}

/// Point-in-time view of the delivery queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub queue_length: usize,
    pub worker_count: usize,
    /// Workers currently holding a notification.
    pub active_workers: usize,
    pub is_running: bool,
}

/// Delivery counters since the service started.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationStats {
    /// Notifications accepted into the queue or the deferred heap.
    pub submitted: u64,
    /// Submissions refused because the queue was full.
    pub rejected: u64,
    /// Successful sends, including those later confirmed as delivered.
    pub sent: u64,
    pub delivered: u64,
    pub failed: u64,
    /// Failed attempts that were scheduled again.
    pub retried: u64,
    pub cancelled: u64,
    /// Notifications waiting in the deferred heap.
    pub deferred: usize,
}

impl NotificationStats {
    /// Share of finished deliveries that succeeded, in `[0, 1]`.
    pub fn success_rate(&self) -> f64 {
        let finished = self.sent + self.failed;
        if finished == 0 {
            return 0.0;
        }
        self.sent as f64 / finished as f64
    }
}
