//! Channel senders.
//!
//! A sender performs the actual transport for one or more notification
//! types. The worker pool looks senders up by type through a
//! [`SenderRegistry`]; a type without a registered sender fails permanently.

mod log;
mod webhook;

pub use log::LogSender;
pub use webhook::{PayloadFormat, WebhookAuth, WebhookConfig, WebhookSender};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::types::{Notification, NotificationType};
use crate::Result;

/// Transport for notifications.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Deliver one notification.
    ///
    /// A returned error is classified by [`crate::Error::is_retryable`].
    async fn send(&self, notification: &Notification) -> Result<()>;

    /// Whether a successful send also counts as delivered.
    ///
    /// Senders without an asynchronous delivery receipt (for example in-app
    /// storage) return `true` so the notification advances straight to
    /// `Delivered`.
    fn synthesizes_delivery(&self) -> bool {
        false
    }
}

/// Mapping from notification type to the sender responsible for it.
#[derive(Clone, Default)]
pub struct SenderRegistry {
    senders: HashMap<NotificationType, Arc<dyn ChannelSender>>,
}

impl SenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sender` for `kind`, replacing any previous one.
    pub fn register(&mut self, kind: NotificationType, sender: Arc<dyn ChannelSender>) {
        self.senders.insert(kind, sender);
    }

    pub fn get(&self, kind: NotificationType) -> Option<Arc<dyn ChannelSender>> {
        self.senders.get(&kind).cloned()
    }

    pub fn supports(&self, kind: NotificationType) -> bool {
        self.senders.contains_key(&kind)
    }

    /// Registered types, in declaration order.
    pub fn kinds(&self) -> Vec<NotificationType> {
        NotificationType::ALL
            .into_iter()
            .filter(|kind| self.supports(*kind))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

impl std::fmt::Debug for SenderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let senders: Vec<(NotificationType, &'static str)> = self
            .kinds()
            .into_iter()
            .filter_map(|kind| self.senders.get(&kind).map(|s| (kind, s.name())))
            .collect();
        f.debug_struct("SenderRegistry")
            .field("senders", &senders)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let mut registry = SenderRegistry::new();
        assert!(registry.is_empty());

        registry.register(NotificationType::InApp, Arc::new(LogSender::in_app()));
        registry.register(NotificationType::Email, Arc::new(LogSender::new()));

        assert_eq!(registry.len(), 2);
        assert!(registry.supports(NotificationType::Email));
        assert!(!registry.supports(NotificationType::Sms));
        assert!(registry.get(NotificationType::Sms).is_none());
        assert_eq!(
            registry.kinds(),
            vec![NotificationType::Email, NotificationType::InApp]
        );
        assert!(
            registry
                .get(NotificationType::InApp)
                .is_some_and(|s| s.synthesizes_delivery())
        );
    }

    #[test]
    fn test_register_replaces_previous_sender() {
        let mut registry = SenderRegistry::new();
        registry.register(NotificationType::Email, Arc::new(LogSender::new()));
        registry.register(NotificationType::Email, Arc::new(LogSender::in_app()));

        assert_eq!(registry.len(), 1);
        assert!(
            registry
                .get(NotificationType::Email)
                .is_some_and(|s| s.synthesizes_delivery())
        );
    }
}
