//! Periodic sweep over task data.
//!
//! Each tick reads overdue and upcoming tasks from the repository and turns
//! them into reminders submitted to the notification service.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::tracker::ReminderTracker;
use crate::clock;
use crate::config::SchedulerConfig;
use crate::notification::{NotificationPriority, NotificationService, NotificationTrigger};
use crate::repository::{Task, TaskRepository};
use crate::{Error, Result};

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Overdue reminders submitted.
    pub overdue: usize,
    /// Due-soon reminders submitted.
    pub due_soon: usize,
    /// Reminders skipped because one was sent recently or the user switched
    /// them off.
    pub suppressed: usize,
    /// Reminders the service refused.
    pub failed: usize,
}

impl SweepReport {
    pub fn submitted(&self) -> usize {
        self.overdue + self.due_soon
    }
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub interval: Duration,
    /// Task/trigger pairs currently remembered for de-duplication.
    pub tracked_reminders: usize,
}

/// Drives the periodic sweep and offers reminder scheduling helpers.
pub struct Scheduler {
    service: Arc<NotificationService>,
    repository: Arc<dyn TaskRepository>,
    config: SchedulerConfig,
    tracker: Option<ReminderTracker>,
    cancellation_token: CancellationToken,
    running: AtomicBool,
    handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a scheduler that stops together with `service`.
    pub fn new(
        service: Arc<NotificationService>,
        repository: Arc<dyn TaskRepository>,
        config: SchedulerConfig,
    ) -> Self {
        let tracker = config.renotify_interval.map(ReminderTracker::new);
        Self {
            cancellation_token: service.shutdown_token(),
            service,
            repository,
            config,
            tracker,
            running: AtomicBool::new(false),
            handle: parking_lot::Mutex::new(None),
        }
    }

    /// Start the periodic sweep. The first sweep runs one interval from now.
    pub fn start(self: &Arc<Self>) {
        if self.cancellation_token.is_cancelled() {
            warn!("Scheduler cannot start after shutdown");
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("Scheduler already running");
            return;
        }

        let scheduler = self.clone();
        let interval = self.config.interval.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = scheduler.cancellation_token.cancelled() => break,
                    _ = ticker.tick() => {
                        scheduler.sweep_once().await;
                    }
                }
            }

            scheduler.running.store(false, Ordering::SeqCst);
            info!("Notification scheduler stopped");
        });
        *self.handle.lock() = Some(handle);

        info!("Notification scheduler started with interval: {:?}", interval);
    }

    /// Stop the sweep and wait for an in-progress one to finish.
    pub async fn stop(&self) {
        self.cancellation_token.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            error!("Scheduler task ended abnormally: {}", e);
        }
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            is_running: self.running.load(Ordering::SeqCst)
                && !self.cancellation_token.is_cancelled(),
            interval: self.config.interval,
            tracked_reminders: self.tracker.as_ref().map_or(0, ReminderTracker::len),
        }
    }

    /// Run one pass over the repository.
    pub async fn sweep_once(&self) -> SweepReport {
        let now = self.service.clock().now();
        let mut report = SweepReport::default();

        if let Some(tracker) = &self.tracker {
            tracker.prune(now);
        }

        self.check_overdue_tasks(now, &mut report).await;
        self.check_due_soon_tasks(now, &mut report).await;

        if report.submitted() > 0 || report.failed > 0 {
            info!(
                overdue = report.overdue,
                due_soon = report.due_soon,
                suppressed = report.suppressed,
                failed = report.failed,
                "Sweep completed"
            );
        } else {
            debug!(suppressed = report.suppressed, "Sweep found nothing to send");
        }
        report
    }

    fn is_suppressed(&self, task_id: i64, trigger: NotificationTrigger, now: DateTime<Utc>) -> bool {
        self.tracker
            .as_ref()
            .is_some_and(|t| !t.should_notify(task_id, trigger, now))
    }

    fn mark_notified(&self, task_id: i64, trigger: NotificationTrigger, now: DateTime<Utc>) {
        if let Some(tracker) = &self.tracker {
            tracker.mark(task_id, trigger, now);
        }
    }

    async fn check_overdue_tasks(&self, now: DateTime<Utc>, report: &mut SweepReport) {
        let tasks = match self.repository.overdue_tasks().await {
            Ok(tasks) => tasks,
            Err(e) => {
                error!("Error getting overdue tasks: {}", e);
                return;
            }
        };
        debug!("Found {} overdue tasks", tasks.len());

        for task in tasks {
            let (Some(user_id), Some(due)) = (task.user_id, task.due_date) else {
                continue;
            };
            if self.is_suppressed(task.id, NotificationTrigger::Overdue, now) {
                report.suppressed += 1;
                continue;
            }

            let overdue_hours = now.signed_duration_since(due).num_hours();
            match self
                .service
                .create_overdue_reminder(user_id, task.id, &task.title, overdue_hours)
                .await
            {
                Ok(_) => {
                    report.overdue += 1;
                    self.mark_notified(task.id, NotificationTrigger::Overdue, now);
                }
                Err(Error::Disabled { .. }) => report.suppressed += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(task_id = task.id, "Failed to submit overdue reminder: {}", e);
                }
            }
        }
    }

    async fn check_due_soon_tasks(&self, now: DateTime<Utc>, report: &mut SweepReport) {
        let tasks = match self.repository.all_tasks().await {
            Ok(tasks) => tasks,
            Err(e) => {
                error!("Error getting tasks: {}", e);
                return;
            }
        };
        let window_end = chrono::Duration::from_std(self.config.due_soon_window)
            .ok()
            .and_then(|window| now.checked_add_signed(window))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        for task in tasks {
            if task.completed {
                continue;
            }
            let (Some(user_id), Some(due)) = (task.user_id, task.due_date) else {
                continue;
            };
            if !(due > now && due < window_end) {
                continue;
            }
            if self.is_suppressed(task.id, NotificationTrigger::DueDate, now) {
                report.suppressed += 1;
                continue;
            }

            let minutes_until_due = due.signed_duration_since(now).num_minutes();
            let notification = match self
                .service
                .user_notification(user_id, task.id, NotificationTrigger::DueDate)
                .await
            {
                Ok(notification) => notification,
                Err(Error::Disabled { .. }) => {
                    report.suppressed += 1;
                    continue;
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(task_id = task.id, "Failed to build due-soon reminder: {}", e);
                    continue;
                }
            }
            .with_priority(NotificationPriority::Normal)
                .with_content(
                    format!("Task Reminder: {}", task.title),
                    format!(
                        "Your task '{}' is due in {} minutes.",
                        task.title, minutes_until_due
                    ),
                );

            match self.service.send_notification(notification) {
                Ok(()) => {
                    report.due_soon += 1;
                    self.mark_notified(task.id, NotificationTrigger::DueDate, now);
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(task_id = task.id, "Failed to submit due-soon reminder: {}", e);
                }
            }
        }
    }

    /// Schedule a reminder `reminder_minutes` before the task's due date.
    ///
    /// Fails with a validation error when the task has no due date or owner,
    /// or when the reminder time has already passed.
    pub async fn schedule_task_reminder(&self, task: &Task, reminder_minutes: i64) -> Result<u64> {
        let (user_id, due) = Self::reminder_target(task)?;
        let at = clock::minutes_before(due, reminder_minutes)?;
        if at < self.service.clock().now() {
            return Err(Error::validation(format!(
                "reminder time for task {} is in the past",
                task.id
            )));
        }
        self.service
            .create_task_reminder(user_id, task.id, &task.title, due, reminder_minutes)
            .await
    }

    /// Schedule up to `max_reminders` reminders, `interval_minutes` apart,
    /// counting back from the due date.
    ///
    /// Reminders whose time has passed are skipped and individual failures
    /// are logged; the ids of the scheduled reminders are returned. Fails
    /// with [`Error::Disabled`] when the user switched off due-date reminders.
    pub async fn schedule_recurring_reminder(
        &self,
        task: &Task,
        interval_minutes: i64,
        max_reminders: u32,
    ) -> Result<Vec<u64>> {
        let (user_id, due) = Self::reminder_target(task)?;
        if interval_minutes <= 0 {
            return Err(Error::validation("reminder interval must be positive"));
        }

        let now = self.service.clock().now();
        let mut scheduled = Vec::new();
        for i in 1..=i64::from(max_reminders) {
            // Later reminders only move further back, so stop at the first
            // one that is out of range.
            let Some((minutes_before, at)) = i
                .checked_mul(interval_minutes)
                .and_then(|m| clock::minutes_before(due, m).ok().map(|at| (m, at)))
            else {
                warn!(
                    task_id = task.id,
                    "Recurring reminder {} is out of range, stopping", i
                );
                break;
            };
            if at <= now {
                continue;
            }

            let notification = self
                .service
                .user_notification(user_id, task.id, NotificationTrigger::DueDate)
                .await?
                .with_priority(NotificationPriority::Normal)
                .with_content(
                    format!("Task Reminder {}/{}: {}", i, max_reminders, task.title),
                    format!(
                        "Your task '{}' is due in {} minutes.",
                        task.title, minutes_before
                    ),
                );
            let id = notification.id;
            match self.service.schedule_notification(notification, at) {
                Ok(()) => scheduled.push(id),
                Err(e) => warn!(
                    task_id = task.id,
                    "Error scheduling recurring reminder {}: {}", i, e
                ),
            }
        }
        Ok(scheduled)
    }

    fn reminder_target(task: &Task) -> Result<(i64, DateTime<Utc>)> {
        match (task.user_id, task.due_date) {
            (Some(user_id), Some(due)) => Ok((user_id, due)),
            (None, _) => Err(Error::validation(format!("task {} has no owner", task.id))),
            (_, None) => Err(Error::validation(format!(
                "task {} has no due date",
                task.id
            ))),
        }
    }
}
