//! Row model for the `notification` table.
//!
//! Timestamps are stored as `INTEGER` Unix epoch milliseconds (UTC); enums
//! as their snake_case names.

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::notification::Notification;
use crate::{Error, Result};

/// Notification database model.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct NotificationDbModel {
    pub id: i64,
    pub user_id: i64,
    pub task_id: i64,
    pub notification_type: String,
    pub priority: String,
    pub trigger_kind: String,
    pub status: String,
    pub title: String,
    pub message: String,
    pub recipient: String,
    pub channel: String,
    pub scheduled_at: Option<i64>,
    pub sent_at: Option<i64>,
    pub delivered_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    pub retry_count: i64,
    pub max_retries: Option<i64>,
    pub error: Option<String>,
    /// JSON object.
    pub metadata: String,
}

fn to_ms(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

fn from_ms(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| Error::Other(format!("timestamp out of range: {}", ms)))
}

/// Narrow an integer column, rejecting values the field cannot hold.
fn narrow<T: TryFrom<i64>>(column: &str, value: i64) -> Result<T> {
    T::try_from(value).map_err(|_| Error::Other(format!("{} out of range: {}", column, value)))
}

/// Parse a stored enum name through its serde representation.
fn parse_enum<T: DeserializeOwned>(value: &str) -> Result<T> {
    Ok(serde_json::from_value(serde_json::Value::String(
        value.to_string(),
    ))?)
}

impl NotificationDbModel {
    pub fn from_notification(n: &Notification) -> Result<Self> {
        Ok(Self {
            id: i64::try_from(n.id)
                .map_err(|_| Error::validation(format!("notification id {} too large", n.id)))?,
            user_id: n.user_id,
            task_id: n.task_id,
            notification_type: n.kind.to_string(),
            priority: n.priority.to_string(),
            trigger_kind: n.trigger.to_string(),
            status: n.status.to_string(),
            title: n.title.clone(),
            message: n.message.clone(),
            recipient: n.recipient.clone(),
            channel: n.channel.clone(),
            scheduled_at: n.scheduled_at.map(to_ms),
            sent_at: n.sent_at.map(to_ms),
            delivered_at: n.delivered_at.map(to_ms),
            created_at: to_ms(n.created_at),
            updated_at: to_ms(n.updated_at),
            retry_count: i64::from(n.retry_count),
            max_retries: n.max_retries.map(i64::from),
            error: n.error.clone(),
            metadata: serde_json::to_string(&n.metadata)?,
        })
    }

    pub fn into_notification(self) -> Result<Notification> {
        let ms_opt = |v: Option<i64>| v.map(from_ms).transpose();
        Ok(Notification {
            id: narrow("id", self.id)?,
            user_id: self.user_id,
            task_id: self.task_id,
            kind: parse_enum(&self.notification_type)?,
            priority: parse_enum(&self.priority)?,
            trigger: parse_enum(&self.trigger_kind)?,
            status: parse_enum(&self.status)?,
            title: self.title,
            message: self.message,
            recipient: self.recipient,
            channel: self.channel,
            scheduled_at: ms_opt(self.scheduled_at)?,
            sent_at: ms_opt(self.sent_at)?,
            delivered_at: ms_opt(self.delivered_at)?,
            created_at: from_ms(self.created_at)?,
            updated_at: from_ms(self.updated_at)?,
            retry_count: narrow("retry_count", self.retry_count)?,
            max_retries: self
                .max_retries
                .map(|v| narrow("max_retries", v))
                .transpose()?,
            error: self.error,
            metadata: serde_json::from_str(&self.metadata)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{
        NotificationPriority, NotificationStatus, NotificationTrigger, NotificationType,
    };

    #[test]
    fn test_model_preserves_notification() {
        let mut n = Notification::new(NotificationType::Slack, NotificationTrigger::StatusChange)
            .for_task(2, 8)
            .with_priority(NotificationPriority::Critical)
            .with_channel("#ops")
            .with_max_retries(4)
            .with_metadata("source", serde_json::json!("sweep"));
        n.status = NotificationStatus::Failed;
        n.retry_count = 4;
        n.error = Some("Send failed: 500".to_string());

        let model = NotificationDbModel::from_notification(&n).unwrap();
        assert_eq!(model.notification_type, "slack");
        assert_eq!(model.trigger_kind, "status_change");
        assert_eq!(model.status, "failed");

        let restored = model.into_notification().unwrap();
        assert_eq!(restored.kind, NotificationType::Slack);
        assert_eq!(restored.priority, NotificationPriority::Critical);
        assert_eq!(restored.retry_count, 4);
        assert_eq!(restored.metadata["source"], "sweep");
        assert_eq!(
            restored.created_at.timestamp_millis(),
            n.created_at.timestamp_millis()
        );
    }

    #[test]
    fn test_corrupt_integer_columns_are_errors() {
        let n = Notification::new(NotificationType::Email, NotificationTrigger::Custom);
        let model = NotificationDbModel::from_notification(&n).unwrap();

        let negative_id = NotificationDbModel {
            id: -1,
            ..model.clone()
        };
        assert!(matches!(negative_id.into_notification(), Err(Error::Other(_))));

        let negative_retries = NotificationDbModel {
            retry_count: -3,
            ..model.clone()
        };
        assert!(matches!(
            negative_retries.into_notification(),
            Err(Error::Other(_))
        ));

        let huge_budget = NotificationDbModel {
            max_retries: Some(i64::from(u32::MAX) + 1),
            ..model
        };
        assert!(matches!(huge_budget.into_notification(), Err(Error::Other(_))));
    }

    #[test]
    fn test_unknown_enum_name_is_an_error() {
        assert!(parse_enum::<NotificationType>("carrier_pigeon").is_err());
    }
}
