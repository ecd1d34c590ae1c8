use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use task_notifier::config::{NotificationConfig, SchedulerConfig, load_dotenv};
use task_notifier::database::{self, SqliteNotificationStore};
use task_notifier::logging;
use task_notifier::notification::{
    InMemorySettingsStore, LogSender, NotificationService, NotificationSettings, NotificationType,
    PayloadFormat, WebhookConfig, WebhookSender,
};
use task_notifier::repository::{InMemoryTaskRepository, Task};
use task_notifier::scheduler::Scheduler;

/// Load tasks from a JSON array file into the in-memory repository.
fn load_tasks(repository: &InMemoryTaskRepository, path: &str) -> anyhow::Result<usize> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    let tasks: Vec<Task> =
        serde_json::from_str(&raw).with_context(|| format!("parsing tasks from {}", path))?;
    let count = tasks.len();
    for task in tasks {
        repository.upsert_task(task);
    }
    Ok(count)
}

/// Load per-user settings from a JSON object keyed by user id.
fn load_settings(store: &InMemorySettingsStore, path: &str) -> anyhow::Result<usize> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    let settings: HashMap<i64, NotificationSettings> =
        serde_json::from_str(&raw).with_context(|| format!("parsing settings from {}", path))?;
    let count = settings.len();
    for (user_id, user_settings) in settings {
        store.set(user_id, user_settings);
    }
    Ok(count)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    load_dotenv();

    let log_dir = std::env::var("LOG_DIR").ok().map(PathBuf::from);
    let (logging_config, _log_guard) = logging::init_logging(log_dir.as_deref())?;
    tracing::info!(filter = %logging_config.get_filter(), "Logging initialized");

    let notification_config = NotificationConfig::from_env()?;
    let scheduler_config = SchedulerConfig::from_env()?;

    let repository = Arc::new(InMemoryTaskRepository::new());
    if let Ok(path) = std::env::var("TASKS_FILE") {
        let count = load_tasks(&repository, &path)?;
        tracing::info!("Loaded {} tasks from {}", count, path);
    }

    let mut builder = NotificationService::builder(notification_config)
        .with_sender(NotificationType::Email, Arc::new(LogSender::new()))
        .with_sender(NotificationType::Sms, Arc::new(LogSender::new()))
        .with_sender(NotificationType::InApp, Arc::new(LogSender::in_app()))
        .with_repository(repository.clone());

    if let Ok(url) = std::env::var("NOTIFY_WEBHOOK_URL") {
        for (kind, format) in [
            (NotificationType::Webhook, PayloadFormat::Generic),
            (NotificationType::Slack, PayloadFormat::Slack),
            (NotificationType::Discord, PayloadFormat::Discord),
        ] {
            let sender = WebhookSender::new(WebhookConfig::new(url.clone(), format))?;
            builder = builder.with_sender(kind, Arc::new(sender));
        }
    }

    if let Ok(path) = std::env::var("SETTINGS_FILE") {
        let settings = Arc::new(InMemorySettingsStore::new());
        let count = load_settings(&settings, &path)?;
        tracing::info!("Loaded notification settings for {} users from {}", count, path);
        builder = builder.with_settings(settings);
    }

    if let Ok(database_url) = std::env::var("DATABASE_URL") {
        let pool = database::init_pool(&database_url).await?;
        database::run_migrations(&pool).await?;
        builder = builder.with_store(Arc::new(SqliteNotificationStore::new(pool)));
    }

    let service = builder.start()?;

    logging_config.start_retention_cleanup(service.shutdown_token());
    #[cfg(unix)]
    logging_config.reload_on_hangup(service.shutdown_token());
    let scheduler = Arc::new(Scheduler::new(
        service.clone(),
        repository,
        scheduler_config,
    ));
    scheduler.start();

    tracing::info!("task-notifier running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;

    scheduler.stop().await;
    service.stop().await;

    let stats = service.stats();
    tracing::info!(
        sent = stats.sent,
        failed = stats.failed,
        "task-notifier stopped (success rate {:.1}%)",
        stats.success_rate() * 100.0
    );

    Ok(())
}
