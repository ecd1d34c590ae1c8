//! Application-wide error types.

use thiserror::Error;

use crate::notification::NotificationType;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The delivery queue is at capacity; the caller may retry later or drop.
    #[error("Notification queue is full")]
    QueueFull,

    /// The service has been stopped and no longer accepts work.
    #[error("Notification service is stopped")]
    ServiceStopped,

    /// The user switched off this channel or this kind of notification.
    #[error("Notifications disabled for user {user_id}: {what}")]
    Disabled { user_id: i64, what: String },

    #[error("Unsupported notification type: {0}")]
    UnsupportedType(NotificationType),

    /// A channel sender failed to deliver.
    #[error("Send failed: {0}")]
    Send(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn disabled(user_id: i64, what: impl Into<String>) -> Self {
        Self::Disabled {
            user_id,
            what: what.into(),
        }
    }

    pub fn send(msg: impl Into<String>) -> Self {
        Self::Send(msg.into())
    }

    /// Whether a delivery that failed with this error may succeed on a later attempt.
    ///
    /// Malformed input and missing senders cannot resolve themselves.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Validation(_)
                | Self::UnsupportedType(_)
                | Self::Disabled { .. }
                | Self::Configuration(_)
                | Self::Serialization(_)
                | Self::QueueFull
                | Self::ServiceStopped
        )
    }
}
