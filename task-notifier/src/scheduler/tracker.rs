//! Reminder de-duplication.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::notification::NotificationTrigger;

/// Remembers when each task was last reminded about, per trigger, so a sweep
/// does not repeat the same reminder within `interval`.
#[derive(Debug)]
pub struct ReminderTracker {
    last_notified: DashMap<(i64, NotificationTrigger), DateTime<Utc>>,
    interval: chrono::Duration,
}

impl ReminderTracker {
    pub fn new(interval: std::time::Duration) -> Self {
        Self {
            last_notified: DashMap::new(),
            interval: chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Whether a reminder for `task_id` and `trigger` may be sent at `now`.
    pub fn should_notify(
        &self,
        task_id: i64,
        trigger: NotificationTrigger,
        now: DateTime<Utc>,
    ) -> bool {
        match self.last_notified.get(&(task_id, trigger)) {
            Some(last) => now.signed_duration_since(*last) >= self.interval,
            None => true,
        }
    }

    pub fn mark(&self, task_id: i64, trigger: NotificationTrigger, now: DateTime<Utc>) {
        self.last_notified.insert((task_id, trigger), now);
    }

    pub fn forget_task(&self, task_id: i64) {
        self.last_notified.retain(|(id, _), _| *id != task_id);
    }

    /// Drop entries that no longer suppress anything.
    ///
    /// Returns the number of removed entries.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let before = self.last_notified.len();
        self.last_notified
            .retain(|_, last| now.signed_duration_since(*last) < self.interval);
        before - self.last_notified.len()
    }

    pub fn len(&self) -> usize {
        self.last_notified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_notified.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_suppresses_within_interval() {
        let tracker = ReminderTracker::new(Duration::from_secs(24 * 60 * 60));
        let now = Utc::now();

        assert!(tracker.should_notify(1, NotificationTrigger::Overdue, now));
        tracker.mark(1, NotificationTrigger::Overdue, now);

        let later = now + chrono::Duration::hours(1);
        assert!(!tracker.should_notify(1, NotificationTrigger::Overdue, later));
        // Other triggers and tasks are tracked separately.
        assert!(tracker.should_notify(1, NotificationTrigger::DueDate, later));
        assert!(tracker.should_notify(2, NotificationTrigger::Overdue, later));

        let next_day = now + chrono::Duration::hours(24);
        assert!(tracker.should_notify(1, NotificationTrigger::Overdue, next_day));
    }

    #[test]
    fn test_prune_and_forget() {
        let tracker = ReminderTracker::new(Duration::from_secs(60));
        let now = Utc::now();
        tracker.mark(1, NotificationTrigger::Overdue, now - chrono::Duration::minutes(5));
        tracker.mark(2, NotificationTrigger::Overdue, now);
        tracker.mark(2, NotificationTrigger::DueDate, now);

        assert_eq!(tracker.prune(now), 1);
        assert_eq!(tracker.len(), 2);

        tracker.forget_task(2);
        assert!(tracker.is_empty());
    }
}
