//! SQLite-backed [`NotificationStore`].

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::models::NotificationDbModel;
use crate::notification::{Notification, NotificationStatus, NotificationStore};
use crate::{Error, Result};

/// Upserts finished notifications into the `notification` table.
pub struct SqliteNotificationStore {
    pool: SqlitePool,
}

impl SqliteNotificationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: u64) -> Result<Notification> {
        sqlx::query_as::<_, NotificationDbModel>("SELECT * FROM notification WHERE id = ?")
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Notification", id.to_string()))?
            .into_notification()
    }

    /// Most recent notifications of a user, newest first.
    pub async fn list_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationDbModel>(
            "SELECT * FROM notification WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(NotificationDbModel::into_notification)
            .collect()
    }

    pub async fn count_by_status(&self, status: NotificationStatus) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM notification WHERE status = ?")
                .bind(status.to_string())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

#[async_trait]
impl NotificationStore for SqliteNotificationStore {
    async fn record(&self, notification: &Notification) -> Result<()> {
        let model = NotificationDbModel::from_notification(notification)?;
        sqlx::query(
            r#"
            INSERT INTO notification (
                id, user_id, task_id, notification_type, priority, trigger_kind, status,
                title, message, recipient, channel, scheduled_at, sent_at, delivered_at,
                created_at, updated_at, retry_count, max_retries, error, metadata
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                scheduled_at = excluded.scheduled_at,
                sent_at = excluded.sent_at,
                delivered_at = excluded.delivered_at,
                updated_at = excluded.updated_at,
                retry_count = excluded.retry_count,
                max_retries = excluded.max_retries,
                error = excluded.error,
                metadata = excluded.metadata
            "#,
        )
        .bind(model.id)
        .bind(model.user_id)
        .bind(model.task_id)
        .bind(&model.notification_type)
        .bind(&model.priority)
        .bind(&model.trigger_kind)
        .bind(&model.status)
        .bind(&model.title)
        .bind(&model.message)
        .bind(&model.recipient)
        .bind(&model.channel)
        .bind(model.scheduled_at)
        .bind(model.sent_at)
        .bind(model.delivered_at)
        .bind(model.created_at)
        .bind(model.updated_at)
        .bind(model.retry_count)
        .bind(model.max_retries)
        .bind(&model.error)
        .bind(&model.metadata)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            notification_id = notification.id,
            status = %notification.status,
            "Persisted notification"
        );
        Ok(())
    }
}
