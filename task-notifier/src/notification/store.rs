//! Persistence of finished notifications.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::types::Notification;
use crate::Result;

/// Receives every notification that reaches a terminal state.
///
/// Errors are logged by the caller and never affect delivery.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn record(&self, notification: &Notification) -> Result<()>;
}

/// Store that keeps the latest version of each notification in memory.
#[derive(Debug, Default)]
pub struct MemoryNotificationStore {
    records: Mutex<BTreeMap<u64, Notification>>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: u64) -> Option<Notification> {
        self.records.lock().get(&id).cloned()
    }

    /// All recorded notifications ordered by id.
    pub fn snapshot(&self) -> Vec<Notification> {
        self.records.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn record(&self, notification: &Notification) -> Result<()> {
        self.records
            .lock()
            .insert(notification.id, notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{NotificationStatus, NotificationTrigger, NotificationType};

    #[tokio::test]
    async fn test_record_keeps_latest_version() {
        let store = MemoryNotificationStore::new();
        let mut n = Notification::new(NotificationType::InApp, NotificationTrigger::Created);

        n.status = NotificationStatus::Sent;
        store.record(&n).await.unwrap();
        n.status = NotificationStatus::Delivered;
        store.record(&n).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get(n.id).map(|n| n.status),
            Some(NotificationStatus::Delivered)
        );
    }
}
