//! Input validation and the retry decision.
//!
//! Both are pure: they look at a notification and an error and say what
//! should happen next, without touching queues or timers.

use std::time::Duration;

use super::types::{Notification, NotificationType};
use crate::{Error, Result};

/// Check that a notification carries the fields its type needs.
///
/// A failure here is permanent; the notification must not be retried.
pub fn validate(notification: &Notification) -> Result<()> {
    match notification.kind {
        NotificationType::Email | NotificationType::Sms => {
            if notification.recipient.trim().is_empty() {
                return Err(Error::validation(format!(
                    "{} notification {} has no recipient",
                    notification.kind, notification.id
                )));
            }
        }
        NotificationType::Webhook | NotificationType::Slack | NotificationType::Discord => {
            if notification.channel.trim().is_empty() {
                return Err(Error::validation(format!(
                    "{} notification {} has no channel",
                    notification.kind, notification.id
                )));
            }
        }
        NotificationType::InApp => {
            if notification.user_id <= 0 {
                return Err(Error::validation(format!(
                    "in-app notification {} has no user",
                    notification.id
                )));
            }
        }
    }
    Ok(())
}

/// What to do with a notification whose delivery attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Attempt again after `delay`; `attempt` is the new retry count.
    Retry { attempt: u32, delay: Duration },
    /// Terminal failure.
    GiveUp,
}

/// Fixed-delay retry policy.
///
/// Every retry waits the same configured delay; there is no backoff growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    delay: Duration,
}

impl RetryPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Decide the next step after `error` for a notification that has
    /// already been retried `retry_count` times out of `max_retries`.
    pub fn decide(&self, retry_count: u32, max_retries: u32, error: &Error) -> RetryDecision {
        if !error.is_retryable() || retry_count >= max_retries {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry {
            attempt: retry_count + 1,
            delay: self.delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::NotificationTrigger;

    fn policy() -> RetryPolicy {
        RetryPolicy::fixed(Duration::from_secs(300))
    }

    #[test]
    fn test_retry_until_budget_exhausted() {
        let err = Error::send("connection reset");
        assert_eq!(
            policy().decide(0, 3, &err),
            RetryDecision::Retry {
                attempt: 1,
                delay: Duration::from_secs(300)
            }
        );
        assert_eq!(
            policy().decide(2, 3, &err),
            RetryDecision::Retry {
                attempt: 3,
                delay: Duration::from_secs(300)
            }
        );
        assert_eq!(policy().decide(3, 3, &err), RetryDecision::GiveUp);
    }

    #[test]
    fn test_delay_does_not_grow() {
        let err = Error::send("503");
        let delays: Vec<Duration> = (0..3)
            .filter_map(|count| match policy().decide(count, 5, &err) {
                RetryDecision::Retry { delay, .. } => Some(delay),
                RetryDecision::GiveUp => None,
            })
            .collect();
        assert_eq!(delays, vec![Duration::from_secs(300); 3]);
    }

    #[test]
    fn test_zero_budget_gives_up_immediately() {
        assert_eq!(
            policy().decide(0, 0, &Error::send("down")),
            RetryDecision::GiveUp
        );
    }

    #[test]
    fn test_non_retryable_errors_give_up() {
        assert_eq!(
            policy().decide(0, 3, &Error::validation("missing recipient")),
            RetryDecision::GiveUp
        );
        assert_eq!(
            policy().decide(0, 3, &Error::UnsupportedType(NotificationType::Sms)),
            RetryDecision::GiveUp
        );
    }

    #[test]
    fn test_validate_required_fields() {
        let email = Notification::new(NotificationType::Email, NotificationTrigger::Custom);
        assert!(matches!(validate(&email), Err(Error::Validation(_))));
        assert!(validate(&email.with_recipient("a@example.com")).is_ok());

        let sms = Notification::new(NotificationType::Sms, NotificationTrigger::Custom)
            .with_recipient("   ");
        assert!(validate(&sms).is_err());

        let slack = Notification::new(NotificationType::Slack, NotificationTrigger::Custom);
        assert!(validate(&slack).is_err());
        assert!(validate(&slack.with_channel("#tasks")).is_ok());

        let in_app = Notification::new(NotificationType::InApp, NotificationTrigger::Custom);
        assert!(validate(&in_app).is_err());
        assert!(validate(&in_app.for_task(4, 9)).is_ok());
    }
}
