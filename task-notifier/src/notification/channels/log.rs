//! Sender that writes notifications to the log.

use async_trait::async_trait;
use tracing::info;

use super::ChannelSender;
use crate::Result;
use crate::notification::types::Notification;

/// Logs each notification instead of transporting it.
///
/// Used for in-app notifications, which are surfaced from the store, and as
/// a stand-in for transports that are not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSender {
    confirms_delivery: bool,
}

impl LogSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log sender whose sends count as delivered.
    pub fn in_app() -> Self {
        Self {
            confirms_delivery: true,
        }
    }
}

#[async_trait]
impl ChannelSender for LogSender {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        info!(
            notification_id = notification.id,
            kind = %notification.kind,
            user_id = notification.user_id,
            task_id = notification.task_id,
            priority = %notification.priority,
            "{}: {}",
            notification.title,
            notification.message
        );
        Ok(())
    }

    fn synthesizes_delivery(&self) -> bool {
        self.confirms_delivery
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{NotificationTrigger, NotificationType};

    #[tokio::test]
    async fn test_log_sender_always_succeeds() {
        let sender = LogSender::new();
        let n = Notification::new(NotificationType::Email, NotificationTrigger::Custom)
            .with_content("hello", "world");
        assert!(sender.send(&n).await.is_ok());
        assert!(!sender.synthesizes_delivery());
        assert!(LogSender::in_app().synthesizes_delivery());
    }
}
