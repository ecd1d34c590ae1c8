//! Notification delivery.
//!
//! Notifications enter through [`NotificationService`], wait in a bounded
//! queue (or in the deferred heap when scheduled for later), and are carried
//! to a terminal state by a fixed pool of workers.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use task_notifier::config::NotificationConfig;
//! use task_notifier::notification::{LogSender, NotificationService, NotificationType};
//!
//! let service = NotificationService::builder(NotificationConfig::default())
//!     .with_sender(NotificationType::InApp, Arc::new(LogSender::in_app()))
//!     .start()?;
//!
//! service.create_task_created_notification(1, 42, "Write report").await?;
//! service.stop().await;
//! ```

pub mod channels;
pub mod deferred;
pub mod retry;
pub mod service;
pub mod settings;
pub mod store;
pub mod types;
pub mod worker;

pub use channels::{
    ChannelSender, LogSender, PayloadFormat, SenderRegistry, WebhookConfig, WebhookSender,
};
pub use deferred::DeferredQueue;
pub use retry::{RetryDecision, RetryPolicy};
pub use service::{NotificationService, NotificationServiceBuilder};
pub use settings::{InMemorySettingsStore, NotificationSettings, SettingsProvider};
pub use store::{MemoryNotificationStore, NotificationStore};
pub use types::{
    Notification, NotificationPriority, NotificationStats, NotificationStatus,
    NotificationTrigger, NotificationType, QueueStatus,
};
pub use worker::WorkerPool;
