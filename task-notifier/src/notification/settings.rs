//! Per-user notification preferences.
//!
//! Users switch channels and reminder kinds on or off. A user without stored
//! settings gets [`NotificationSettings::default`].

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::types::{NotificationTrigger, NotificationType};
use crate::Result;

/// Channel and trigger switches of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub email_enabled: bool,
    pub in_app_enabled: bool,
    pub sms_enabled: bool,
    pub webhook_enabled: bool,
    pub slack_enabled: bool,
    pub discord_enabled: bool,

    pub due_date_reminder: bool,
    pub overdue_reminder: bool,
    pub status_change_reminder: bool,
    pub created_reminder: bool,
    pub updated_reminder: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email_enabled: true,
            in_app_enabled: true,
            sms_enabled: false,
            webhook_enabled: false,
            slack_enabled: false,
            discord_enabled: false,
            due_date_reminder: true,
            overdue_reminder: true,
            status_change_reminder: false,
            created_reminder: false,
            updated_reminder: false,
        }
    }
}

impl NotificationSettings {
    /// Everything switched on.
    pub fn all_enabled() -> Self {
        Self {
            email_enabled: true,
            in_app_enabled: true,
            sms_enabled: true,
            webhook_enabled: true,
            slack_enabled: true,
            discord_enabled: true,
            due_date_reminder: true,
            overdue_reminder: true,
            status_change_reminder: true,
            created_reminder: true,
            updated_reminder: true,
        }
    }

    pub fn allows_channel(&self, kind: NotificationType) -> bool {
        match kind {
            NotificationType::Email => self.email_enabled,
            NotificationType::InApp => self.in_app_enabled,
            NotificationType::Sms => self.sms_enabled,
            NotificationType::Webhook => self.webhook_enabled,
            NotificationType::Slack => self.slack_enabled,
            NotificationType::Discord => self.discord_enabled,
        }
    }

    /// Custom notifications have no switch and are always allowed.
    pub fn allows_trigger(&self, trigger: NotificationTrigger) -> bool {
        match trigger {
            NotificationTrigger::DueDate => self.due_date_reminder,
            NotificationTrigger::Overdue => self.overdue_reminder,
            NotificationTrigger::StatusChange => self.status_change_reminder,
            NotificationTrigger::Created => self.created_reminder,
            NotificationTrigger::Updated => self.updated_reminder,
            NotificationTrigger::Custom => true,
        }
    }
}

/// Source of user preferences.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    /// Stored settings of `user_id`, `None` when the user never saved any.
    async fn settings(&self, user_id: i64) -> Result<Option<NotificationSettings>>;
}

/// Settings held in memory.
#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    settings: RwLock<HashMap<i64, NotificationSettings>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, user_id: i64, settings: NotificationSettings) {
        self.settings.write().insert(user_id, settings);
    }
}

#[async_trait]
impl SettingsProvider for InMemorySettingsStore {
    async fn settings(&self, user_id: i64) -> Result<Option<NotificationSettings>> {
        Ok(self.settings.read().get(&user_id).cloned())
    }
}
