//! Notification service.
//!
//! The NotificationService owns the delivery queue, the worker pool and the
//! deferred heap, and is the only way to submit work:
//! - Immediate submission with a non-blocking enqueue
//! - Deferred submission for a future instant
//! - Cancellation of deferred notifications
//! - Convenience builders for task reminders and change notifications

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::channels::{ChannelSender, SenderRegistry};
use super::deferred::{self, DeferredQueue};
use super::retry::RetryPolicy;
use super::settings::{NotificationSettings, SettingsProvider};
use super::store::NotificationStore;
use super::types::{
    Notification, NotificationPriority, NotificationStats, NotificationStatus,
    NotificationTrigger, NotificationType, QueueStatus,
};
use super::worker::{DeliveryContext, DeliveryCounters, SharedReceiver, WorkerPool};
use crate::clock::{self, Clock, SystemClock};
use crate::config::NotificationConfig;
use crate::repository::TaskRepository;
use crate::{Error, Result};

/// Builder for [`NotificationService`].
pub struct NotificationServiceBuilder {
    config: NotificationConfig,
    registry: SenderRegistry,
    store: Option<Arc<dyn NotificationStore>>,
    repository: Option<Arc<dyn TaskRepository>>,
    settings: Option<Arc<dyn SettingsProvider>>,
    clock: Arc<dyn Clock>,
}

impl NotificationServiceBuilder {
    /// Register the sender for a notification type.
    pub fn with_sender(mut self, kind: NotificationType, sender: Arc<dyn ChannelSender>) -> Self {
        self.registry.register(kind, sender);
        self
    }

    /// Persist notifications once they reach a terminal state.
    pub fn with_store(mut self, store: Arc<dyn NotificationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Used by the email builders to look up recipient addresses.
    pub fn with_repository(mut self, repository: Arc<dyn TaskRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Honor per-user channel and trigger switches. Without a provider
    /// every channel and trigger is allowed.
    pub fn with_settings(mut self, settings: Arc<dyn SettingsProvider>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the configuration and spawn the workers and the deferred
    /// dispatcher on the current runtime.
    pub fn start(self) -> Result<Arc<NotificationService>> {
        self.config.validate()?;

        let (sender, receiver) = mpsc::channel(self.config.batch_size);
        let receiver: SharedReceiver = Arc::new(AsyncMutex::new(receiver));
        let cancellation_token = CancellationToken::new();
        let deferred = Arc::new(DeferredQueue::new());
        let counters = Arc::new(DeliveryCounters::default());

        if self.registry.is_empty() {
            warn!("Notification service started without any channel senders");
        }

        let context = Arc::new(DeliveryContext {
            registry: self.registry,
            policy: RetryPolicy::fixed(self.config.retry_delay()),
            deferred: deferred.clone(),
            store: self.store,
            clock: self.clock.clone(),
            counters: counters.clone(),
        });

        let workers = WorkerPool::new(self.config.worker_count, cancellation_token.child_token());
        workers.start(receiver.clone(), context.clone());

        let dispatcher = tokio::spawn(deferred::run_dispatcher(
            deferred.clone(),
            sender.clone(),
            self.clock.clone(),
            cancellation_token.child_token(),
        ));

        info!(
            worker_count = self.config.worker_count,
            batch_size = self.config.batch_size,
            max_retries = self.config.max_retries,
            retry_delay_secs = self.config.retry_delay_seconds,
            "Notification service started"
        );

        Ok(Arc::new(NotificationService {
            config: self.config,
            sender,
            receiver,
            deferred,
            workers,
            dispatcher: parking_lot::Mutex::new(Some(dispatcher)),
            context,
            repository: self.repository,
            settings: self.settings,
            clock: self.clock,
            counters,
            cancellation_token,
        }))
    }
}

/// Asynchronous notification delivery engine.
pub struct NotificationService {
    config: NotificationConfig,
    sender: mpsc::Sender<Notification>,
    receiver: SharedReceiver,
    deferred: Arc<DeferredQueue>,
    workers: WorkerPool,
    dispatcher: parking_lot::Mutex<Option<JoinHandle<()>>>,
    context: Arc<DeliveryContext>,
    repository: Option<Arc<dyn TaskRepository>>,
    settings: Option<Arc<dyn SettingsProvider>>,
    clock: Arc<dyn Clock>,
    counters: Arc<DeliveryCounters>,
    cancellation_token: CancellationToken,
}

impl NotificationService {
    pub fn builder(config: NotificationConfig) -> NotificationServiceBuilder {
        NotificationServiceBuilder {
            config,
            registry: SenderRegistry::new(),
            store: None,
            repository: None,
            settings: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// A token that fires when the service stops.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancellation_token.child_token()
    }

    pub fn is_running(&self) -> bool {
        !self.cancellation_token.is_cancelled()
    }

    /// Reset submission-owned fields and fill in defaults.
    ///
    /// A submitted notification starts a fresh delivery: earlier attempts,
    /// outcomes and errors are discarded.
    fn prepare(&self, notification: &mut Notification) {
        if notification.max_retries.is_none() {
            notification.max_retries = Some(self.config.max_retries);
        }
        notification.status = NotificationStatus::Pending;
        notification.retry_count = 0;
        notification.scheduled_at = None;
        notification.sent_at = None;
        notification.delivered_at = None;
        notification.error = None;
        notification.touch(self.clock.now());
    }

    fn enqueue(&self, notification: Notification) -> Result<()> {
        let id = notification.id;
        match self.sender.try_send(notification) {
            Ok(()) => {
                DeliveryCounters::incr(&self.counters.submitted);
                debug!(notification_id = id, "Notification queued");
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                DeliveryCounters::incr(&self.counters.rejected);
                warn!(notification_id = id, "Notification queue is full");
                Err(Error::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(Error::ServiceStopped),
        }
    }

    /// Submit a notification for immediate delivery.
    ///
    /// Never blocks: fails with [`Error::QueueFull`] when the queue is at
    /// capacity and [`Error::ServiceStopped`] after [`stop`](Self::stop).
    pub fn send_notification(&self, mut notification: Notification) -> Result<()> {
        if !self.is_running() {
            return Err(Error::ServiceStopped);
        }
        self.prepare(&mut notification);
        self.enqueue(notification)
    }

    /// Submit a notification for delivery at `at`.
    ///
    /// An instant that is not in the future is treated as immediate.
    pub fn schedule_notification(
        &self,
        mut notification: Notification,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if !self.is_running() {
            return Err(Error::ServiceStopped);
        }
        if at <= self.clock.now() {
            return self.send_notification(notification);
        }

        self.prepare(&mut notification);
        notification.scheduled_at = Some(at);
        let id = notification.id;
        self.deferred.push(notification, at)?;
        DeliveryCounters::incr(&self.counters.submitted);
        debug!(notification_id = id, scheduled_at = %at, "Notification scheduled");
        Ok(())
    }

    /// Cancel a scheduled notification or one waiting for a retry.
    ///
    /// Returns `false` when the notification is not waiting, for example
    /// because it is already queued, in delivery, or finished.
    pub async fn cancel(&self, id: u64) -> bool {
        let Some(mut notification) = self.deferred.cancel(id) else {
            return false;
        };
        notification.mark_cancelled(self.clock.now());
        DeliveryCounters::incr(&self.counters.cancelled);
        info!(notification_id = id, "Notification cancelled");
        self.context.record(&notification).await;
        true
    }

    /// Whether a notification is waiting in the deferred heap.
    pub fn is_deferred(&self, id: u64) -> bool {
        self.deferred.contains(id)
    }

    /// Stop accepting work, let workers finish what they hold, and drop
    /// everything still queued or deferred.
    pub async fn stop(&self) {
        if self.cancellation_token.is_cancelled() && self.dispatcher.lock().is_none() {
            return;
        }
        info!("Stopping notification service");
        self.cancellation_token.cancel();

        self.workers.stop().await;

        let dispatcher = self.dispatcher.lock().take();
        if let Some(handle) = dispatcher
            && let Err(e) = handle.await
        {
            warn!("Deferred dispatcher ended abnormally: {}", e);
        }

        let dropped_deferred = self.deferred.close().len();
        let dropped_queued = {
            let mut receiver = self.receiver.lock().await;
            receiver.close();
            let mut count = 0usize;
            while receiver.try_recv().is_ok() {
                count += 1;
            }
            count
        };

        if dropped_deferred + dropped_queued > 0 {
            warn!(
                queued = dropped_queued,
                deferred = dropped_deferred,
                "Dropped undelivered notifications on shutdown"
            );
        }
        info!("Notification service stopped");
    }

    /// Snapshot of the queue and the workers.
    pub fn queue_status(&self) -> QueueStatus {
        QueueStatus {
            queue_length: self.config.batch_size.saturating_sub(self.sender.capacity()),
            worker_count: self.config.worker_count,
            active_workers: self.workers.active_count(),
            is_running: self.is_running(),
        }
    }

    pub fn stats(&self) -> NotificationStats {
        let c = &self.counters;
        NotificationStats {
            submitted: DeliveryCounters::get(&c.submitted),
            rejected: DeliveryCounters::get(&c.rejected),
            sent: DeliveryCounters::get(&c.sent),
            delivered: DeliveryCounters::get(&c.delivered),
            failed: DeliveryCounters::get(&c.failed),
            retried: DeliveryCounters::get(&c.retried),
            cancelled: DeliveryCounters::get(&c.cancelled),
            deferred: self.deferred.len(),
        }
    }

    /// Preferences of `user_id`. Everything is allowed when no settings
    /// provider is configured.
    pub async fn user_settings(&self, user_id: i64) -> NotificationSettings {
        let Some(provider) = &self.settings else {
            return NotificationSettings::all_enabled();
        };
        match provider.settings(user_id).await {
            Ok(settings) => settings.unwrap_or_default(),
            Err(e) => {
                warn!(user_id, "Failed to load notification settings: {}", e);
                NotificationSettings::default()
            }
        }
    }

    /// Fail with [`Error::Disabled`] unless the user accepts `trigger`
    /// notifications on `kind`.
    pub async fn ensure_allowed(
        &self,
        user_id: i64,
        kind: NotificationType,
        trigger: NotificationTrigger,
    ) -> Result<()> {
        let settings = self.user_settings(user_id).await;
        if !settings.allows_trigger(trigger) {
            return Err(Error::disabled(user_id, format!("{} notifications", trigger)));
        }
        if !settings.allows_channel(kind) {
            return Err(Error::disabled(user_id, format!("{} channel", kind)));
        }
        Ok(())
    }

    /// Build an email notification addressed to `user_id`, or an in-app one
    /// when no address is known or email is switched off.
    ///
    /// Fails with [`Error::Disabled`] when the user switched off `trigger`
    /// or both channels.
    pub async fn user_notification(
        &self,
        user_id: i64,
        task_id: i64,
        trigger: NotificationTrigger,
    ) -> Result<Notification> {
        let settings = self.user_settings(user_id).await;
        if !settings.allows_trigger(trigger) {
            return Err(Error::disabled(user_id, format!("{} notifications", trigger)));
        }

        let email = match &self.repository {
            Some(repository) if settings.email_enabled => {
                match repository.user_email(user_id).await {
                    Ok(email) => email.filter(|e| !e.trim().is_empty()),
                    Err(e) => {
                        warn!(user_id, "Failed to look up user email: {}", e);
                        None
                    }
                }
            }
            _ => None,
        };

        match email {
            Some(address) => Ok(Notification::new(NotificationType::Email, trigger)
                .for_task(user_id, task_id)
                .with_recipient(address)),
            None if settings.in_app_enabled => {
                debug!(user_id, "No email address usable, falling back to in-app");
                Ok(Notification::new(NotificationType::InApp, trigger).for_task(user_id, task_id))
            }
            None => Err(Error::disabled(user_id, "email and in_app channels")),
        }
    }

    /// Remind a user `reminder_minutes` before `due_date`.
    ///
    /// Returns the id of the submitted notification.
    pub async fn create_task_reminder(
        &self,
        user_id: i64,
        task_id: i64,
        task_title: &str,
        due_date: DateTime<Utc>,
        reminder_minutes: i64,
    ) -> Result<u64> {
        let at = clock::minutes_before(due_date, reminder_minutes)?;
        let notification = self
            .user_notification(user_id, task_id, NotificationTrigger::DueDate)
            .await?
            .with_priority(NotificationPriority::Normal)
            .with_content(
                format!("Task Reminder: {}", task_title),
                format!(
                    "Your task '{}' is due in {} minutes.",
                    task_title, reminder_minutes
                ),
            );
        let id = notification.id;
        self.schedule_notification(notification, at)?;
        Ok(id)
    }

    /// Tell a user a task is `overdue_hours` past due.
    pub async fn create_overdue_reminder(
        &self,
        user_id: i64,
        task_id: i64,
        task_title: &str,
        overdue_hours: i64,
    ) -> Result<u64> {
        let notification = self
            .user_notification(user_id, task_id, NotificationTrigger::Overdue)
            .await?
            .with_priority(NotificationPriority::High)
            .with_content(
                format!("Overdue Task: {}", task_title),
                format!(
                    "Your task '{}' is {} hours overdue.",
                    task_title, overdue_hours
                ),
            );
        let id = notification.id;
        self.send_notification(notification)?;
        Ok(id)
    }

    pub async fn create_status_change_notification(
        &self,
        user_id: i64,
        task_id: i64,
        task_title: &str,
        old_status: &str,
        new_status: &str,
    ) -> Result<u64> {
        self.send_in_app(
            user_id,
            task_id,
            NotificationTrigger::StatusChange,
            "Task Status Updated".to_string(),
            format!(
                "Task '{}' status changed from {} to {}",
                task_title, old_status, new_status
            ),
        )
        .await
    }

    pub async fn create_task_created_notification(
        &self,
        user_id: i64,
        task_id: i64,
        task_title: &str,
    ) -> Result<u64> {
        self.send_in_app(
            user_id,
            task_id,
            NotificationTrigger::Created,
            "New Task Created".to_string(),
            format!("Task '{}' has been created", task_title),
        )
        .await
    }

    pub async fn create_task_updated_notification(
        &self,
        user_id: i64,
        task_id: i64,
        task_title: &str,
    ) -> Result<u64> {
        self.send_in_app(
            user_id,
            task_id,
            NotificationTrigger::Updated,
            "Task Updated".to_string(),
            format!("Task '{}' has been updated", task_title),
        )
        .await
    }

    pub async fn create_task_deleted_notification(
        &self,
        user_id: i64,
        task_id: i64,
        task_title: &str,
    ) -> Result<u64> {
        self.send_in_app(
            user_id,
            task_id,
            NotificationTrigger::Custom,
            "Task Deleted".to_string(),
            format!("Task '{}' has been deleted", task_title),
        )
        .await
    }

    /// Send an arbitrary message through the channel of the caller's choice.
    ///
    /// Email is addressed through the repository and falls back to in-app
    /// like the other email builders.
    pub async fn create_custom_notification(
        &self,
        user_id: i64,
        task_id: i64,
        title: &str,
        message: &str,
        kind: NotificationType,
        priority: NotificationPriority,
    ) -> Result<u64> {
        let notification = match kind {
            NotificationType::Email => {
                self.user_notification(user_id, task_id, NotificationTrigger::Custom)
                    .await?
            }
            other => {
                self.ensure_allowed(user_id, other, NotificationTrigger::Custom)
                    .await?;
                Notification::new(other, NotificationTrigger::Custom).for_task(user_id, task_id)
            }
        }
        .with_priority(priority)
        .with_content(title, message);
        let id = notification.id;
        self.send_notification(notification)?;
        Ok(id)
    }

    async fn send_in_app(
        &self,
        user_id: i64,
        task_id: i64,
        trigger: NotificationTrigger,
        title: String,
        message: String,
    ) -> Result<u64> {
        self.ensure_allowed(user_id, NotificationType::InApp, trigger)
            .await?;
        let notification = Notification::new(NotificationType::InApp, trigger)
            .for_task(user_id, task_id)
            .with_content(title, message);
        let id = notification.id;
        self.send_notification(notification)?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::channels::LogSender;
    use crate::notification::settings::InMemorySettingsStore;
    use crate::notification::store::MemoryNotificationStore;
    use crate::repository::InMemoryTaskRepository;
    use async_trait::async_trait;
    use std::time::Duration;

    struct AlwaysFails;

    #[async_trait]
    impl ChannelSender for AlwaysFails {
        fn name(&self) -> &'static str {
            "always-fails"
        }

        async fn send(&self, _notification: &Notification) -> Result<()> {
            Err(Error::send("unreachable"))
        }
    }

    fn config(worker_count: usize, batch_size: usize) -> NotificationConfig {
        NotificationConfig {
            worker_count,
            batch_size,
            max_retries: 1,
            retry_delay_seconds: 0,
        }
    }

    async fn wait_for_records(store: &MemoryNotificationStore, count: usize) {
        for _ in 0..200 {
            if store.len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} records, found {}", count, store.len());
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let result = NotificationService::builder(config(0, 10)).start();
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_send_applies_default_retry_budget() {
        let store = Arc::new(MemoryNotificationStore::new());
        let service = NotificationService::builder(config(1, 4))
            .with_sender(NotificationType::InApp, Arc::new(LogSender::in_app()))
            .with_store(store.clone())
            .start()
            .unwrap();

        let id = service
            .create_task_created_notification(5, 9, "Write report")
            .await
            .unwrap();
        wait_for_records(&store, 1).await;

        let recorded = store.get(id).unwrap();
        assert_eq!(recorded.max_retries, Some(1));
        assert_eq!(recorded.status, NotificationStatus::Delivered);
        assert_eq!(recorded.title, "New Task Created");
        assert_eq!(recorded.message, "Task 'Write report' has been created");
        assert_eq!(recorded.trigger, NotificationTrigger::Created);

        service.stop().await;
    }

    #[tokio::test]
    async fn test_email_builder_falls_back_to_in_app() {
        let repository = Arc::new(InMemoryTaskRepository::new());
        repository.set_user_email(1, "one@example.com");
        let store = Arc::new(MemoryNotificationStore::new());
        let service = NotificationService::builder(config(2, 8))
            .with_sender(NotificationType::Email, Arc::new(LogSender::new()))
            .with_sender(NotificationType::InApp, Arc::new(LogSender::in_app()))
            .with_store(store.clone())
            .with_repository(repository)
            .start()
            .unwrap();

        let known = service
            .create_overdue_reminder(1, 10, "Taxes", 3)
            .await
            .unwrap();
        let unknown = service
            .create_overdue_reminder(2, 11, "Taxes", 3)
            .await
            .unwrap();
        wait_for_records(&store, 2).await;

        let known = store.get(known).unwrap();
        assert_eq!(known.kind, NotificationType::Email);
        assert_eq!(known.recipient, "one@example.com");
        assert_eq!(known.priority, NotificationPriority::High);
        assert_eq!(known.message, "Your task 'Taxes' is 3 hours overdue.");
        assert_eq!(known.status, NotificationStatus::Sent);

        let unknown = store.get(unknown).unwrap();
        assert_eq!(unknown.kind, NotificationType::InApp);
        assert_eq!(unknown.status, NotificationStatus::Delivered);

        service.stop().await;
    }

    #[tokio::test]
    async fn test_cancel_scheduled_notification() {
        let store = Arc::new(MemoryNotificationStore::new());
        let service = NotificationService::builder(config(1, 4))
            .with_sender(NotificationType::InApp, Arc::new(LogSender::in_app()))
            .with_store(store.clone())
            .start()
            .unwrap();

        let due = Utc::now() + chrono::Duration::hours(2);
        let id = service
            .create_task_reminder(3, 4, "Dentist", due, 30)
            .await
            .unwrap();
        assert!(service.is_deferred(id));
        assert_eq!(service.stats().deferred, 1);

        assert!(service.cancel(id).await);
        assert!(!service.cancel(id).await);
        assert_eq!(
            store.get(id).map(|n| n.status),
            Some(NotificationStatus::Cancelled)
        );
        assert_eq!(service.stats().cancelled, 1);

        service.stop().await;
    }

    #[tokio::test]
    async fn test_queue_status_and_stop() {
        let service = NotificationService::builder(config(3, 10))
            .with_sender(NotificationType::InApp, Arc::new(LogSender::in_app()))
            .start()
            .unwrap();

        let status = service.queue_status();
        assert_eq!(status.worker_count, 3);
        assert!(status.is_running);

        service.stop().await;
        service.stop().await;

        let status = service.queue_status();
        assert!(!status.is_running);
        assert!(matches!(
            service.create_task_updated_notification(1, 1, "x").await,
            Err(Error::ServiceStopped)
        ));
    }

    #[tokio::test]
    async fn test_resubmission_starts_fresh_delivery() {
        let store = Arc::new(MemoryNotificationStore::new());
        let service = NotificationService::builder(config(1, 4))
            .with_sender(NotificationType::InApp, Arc::new(AlwaysFails))
            .with_store(store.clone())
            .start()
            .unwrap();

        let mut stale = Notification::new(NotificationType::InApp, NotificationTrigger::Custom)
            .for_task(1, 1)
            .with_max_retries(1);
        stale.retry_count = 5;
        stale.sent_at = Some(Utc::now());
        stale.error = Some("old failure".to_string());
        let id = stale.id;

        service.send_notification(stale).unwrap();
        wait_for_records(&store, 1).await;

        let recorded = store.get(id).unwrap();
        assert_eq!(recorded.status, NotificationStatus::Failed);
        assert_eq!(recorded.retry_count, 1);
        assert_eq!(recorded.max_retries, Some(1));
        assert!(recorded.sent_at.is_none());
        assert_eq!(recorded.error.as_deref(), Some("Send failed: unreachable"));

        service.stop().await;
    }

    #[tokio::test]
    async fn test_reminder_offset_out_of_range_is_rejected() {
        let service = NotificationService::builder(config(1, 4))
            .with_sender(NotificationType::InApp, Arc::new(LogSender::in_app()))
            .start()
            .unwrap();

        let result = service
            .create_task_reminder(1, 1, "t", Utc::now(), i64::MAX)
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(service.stats().submitted, 0);

        service.stop().await;
    }

    #[tokio::test]
    async fn test_user_settings_gate_builders() {
        let repository = Arc::new(InMemoryTaskRepository::new());
        repository.set_user_email(2, "two@example.com");
        repository.set_user_email(3, "three@example.com");

        let settings = Arc::new(InMemorySettingsStore::new());
        settings.set(
            2,
            NotificationSettings {
                email_enabled: false,
                ..NotificationSettings::default()
            },
        );
        settings.set(
            3,
            NotificationSettings {
                email_enabled: false,
                in_app_enabled: false,
                ..NotificationSettings::default()
            },
        );

        let store = Arc::new(MemoryNotificationStore::new());
        let service = NotificationService::builder(config(1, 8))
            .with_sender(NotificationType::Email, Arc::new(LogSender::new()))
            .with_sender(NotificationType::InApp, Arc::new(LogSender::in_app()))
            .with_sender(NotificationType::Slack, Arc::new(LogSender::new()))
            .with_store(store.clone())
            .with_repository(repository)
            .with_settings(settings)
            .start()
            .unwrap();

        // User 1 has no stored settings: defaults switch off "created".
        assert!(matches!(
            service.create_task_created_notification(1, 1, "x").await,
            Err(Error::Disabled { user_id: 1, .. })
        ));
        // Defaults also switch off Slack.
        assert!(matches!(
            service
                .create_custom_notification(
                    1,
                    1,
                    "t",
                    "m",
                    NotificationType::Slack,
                    NotificationPriority::Low,
                )
                .await,
            Err(Error::Disabled { user_id: 1, .. })
        ));

        // Email switched off: the reminder goes in-app although an address is known.
        let id = service
            .create_overdue_reminder(2, 5, "Taxes", 1)
            .await
            .unwrap();
        wait_for_records(&store, 1).await;
        assert_eq!(store.get(id).unwrap().kind, NotificationType::InApp);

        // Nothing left to deliver on.
        assert!(matches!(
            service.create_overdue_reminder(3, 6, "Taxes", 1).await,
            Err(Error::Disabled { user_id: 3, .. })
        ));

        assert_eq!(service.stats().submitted, 1);
        service.stop().await;
    }
}
