//! Engine configuration.
//!
//! Both configs are plain values: built once (from defaults or the
//! environment), validated, and never mutated afterwards.

mod env;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub use env::load_dotenv;

/// Default number of concurrent delivery workers.
pub const DEFAULT_WORKER_COUNT: usize = 5;
/// Default queue capacity.
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Default retry budget applied to notifications that do not set one.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default fixed delay between delivery attempts (5 minutes).
pub const DEFAULT_RETRY_DELAY_SECONDS: u64 = 300;

/// Default sweep interval (1 minute).
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
/// Default due-soon lookahead (1 hour).
const DEFAULT_DUE_SOON_MINUTES: u64 = 60;

/// Process-wide notification engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Number of concurrent delivery workers.
    pub worker_count: usize,
    /// Capacity of the delivery queue.
    pub batch_size: usize,
    /// Retry budget for notifications that do not carry their own.
    pub max_retries: u32,
    /// Fixed delay before a failed delivery is attempted again.
    pub retry_delay_seconds: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_seconds: DEFAULT_RETRY_DELAY_SECONDS,
        }
    }
}

impl NotificationConfig {
    /// Load the configuration from `NOTIFY_*` environment variables,
    /// falling back to defaults for unset ones.
    pub fn from_env() -> Result<Self> {
        load_dotenv();

        let config = Self {
            worker_count: env::parse_or("NOTIFY_WORKER_COUNT", DEFAULT_WORKER_COUNT)?,
            batch_size: env::parse_or("NOTIFY_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            max_retries: env::parse_or("NOTIFY_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            retry_delay_seconds: env::parse_or(
                "NOTIFY_RETRY_DELAY_SECONDS",
                DEFAULT_RETRY_DELAY_SECONDS,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(Error::config("worker_count must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be at least 1"));
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }
}

/// Periodic sweep configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Time between two sweeps.
    pub interval: Duration,
    /// Tasks due within this window from now get a due-soon reminder.
    pub due_soon_window: Duration,
    /// Minimum time between two reminders for the same task and trigger.
    ///
    /// `None` re-notifies on every sweep.
    pub renotify_interval: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            due_soon_window: Duration::from_secs(DEFAULT_DUE_SOON_MINUTES * 60),
            renotify_interval: None,
        }
    }
}

impl SchedulerConfig {
    /// Load the configuration from `SCHEDULER_*` environment variables.
    pub fn from_env() -> Result<Self> {
        load_dotenv();

        let interval_secs = env::parse_or("SCHEDULER_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?;
        if interval_secs == 0 {
            return Err(Error::config("SCHEDULER_INTERVAL_SECS must be at least 1"));
        }
        let due_soon_minutes = env::parse_or("SCHEDULER_DUE_SOON_MINUTES", DEFAULT_DUE_SOON_MINUTES)?;
        let renotify_hours: Option<u64> = env::parse_opt("SCHEDULER_RENOTIFY_HOURS")?;

        Ok(Self {
            interval: Duration::from_secs(interval_secs),
            due_soon_window: scaled_secs("SCHEDULER_DUE_SOON_MINUTES", due_soon_minutes, 60)?,
            renotify_interval: renotify_hours
                .map(|h| scaled_secs("SCHEDULER_RENOTIFY_HOURS", h, 60 * 60))
                .transpose()?,
        })
    }
}

/// `value` units of `unit_secs` seconds each.
fn scaled_secs(key: &str, value: u64, unit_secs: u64) -> Result<Duration> {
    value
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(|| Error::config(format!("{} is too large: {}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_config_default() {
        let config = NotificationConfig::default();
        assert_eq!(config.worker_count, 5);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay_seconds, 300);
        assert_eq!(config.retry_delay(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_notification_config_rejects_zero_sizes() {
        let config = NotificationConfig {
            worker_count: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let config = NotificationConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_scaled_secs_rejects_overflow() {
        assert_eq!(
            scaled_secs("SCHEDULER_RENOTIFY_HOURS", 24, 3600).unwrap(),
            Duration::from_secs(86_400)
        );
        assert!(matches!(
            scaled_secs("SCHEDULER_RENOTIFY_HOURS", u64::MAX, 3600),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.due_soon_window, Duration::from_secs(3600));
        assert!(config.renotify_interval.is_none());
    }
}
