//! Worker pool draining the delivery queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::channels::SenderRegistry;
use super::deferred::DeferredQueue;
use super::retry::{self, RetryDecision, RetryPolicy};
use super::store::NotificationStore;
use super::types::{Notification, NotificationStatus};
use crate::clock::Clock;
use crate::{Error, Result};

/// Upper bound on a single sender call.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(60);

/// Receiving half of the delivery queue, shared by all workers.
pub type SharedReceiver = Arc<AsyncMutex<mpsc::Receiver<Notification>>>;

/// Delivery counters updated by workers and the service.
#[derive(Debug, Default)]
pub(crate) struct DeliveryCounters {
    pub submitted: AtomicU64,
    pub rejected: AtomicU64,
    pub sent: AtomicU64,
    pub delivered: AtomicU64,
    pub failed: AtomicU64,
    pub retried: AtomicU64,
    pub cancelled: AtomicU64,
}

impl DeliveryCounters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Everything a worker needs to carry one notification to a terminal state
/// or back into the deferred heap.
pub(crate) struct DeliveryContext {
    pub registry: SenderRegistry,
    pub policy: RetryPolicy,
    pub deferred: Arc<DeferredQueue>,
    pub store: Option<Arc<dyn NotificationStore>>,
    pub clock: Arc<dyn Clock>,
    pub counters: Arc<DeliveryCounters>,
}

impl DeliveryContext {
    /// Run one delivery attempt.
    ///
    /// Returns `true` when the sender reported success.
    async fn attempt(&self, notification: &Notification) -> Result<bool> {
        retry::validate(notification)?;

        let sender = self
            .registry
            .get(notification.kind)
            .ok_or(Error::UnsupportedType(notification.kind))?;

        match tokio::time::timeout(SEND_TIMEOUT, sender.send(notification)).await {
            Ok(result) => result.map(|()| sender.synthesizes_delivery()),
            Err(_) => Err(Error::send(format!(
                "{} sender timed out after {:?}",
                sender.name(),
                SEND_TIMEOUT
            ))),
        }
    }

    pub async fn deliver(&self, mut notification: Notification) {
        debug!(
            notification_id = notification.id,
            kind = %notification.kind,
            attempt = notification.retry_count,
            "Notification in delivery"
        );

        let result = self.attempt(&notification).await;
        let now = self.clock.now();

        match result {
            Ok(delivered) => {
                notification.mark_sent(now);
                DeliveryCounters::incr(&self.counters.sent);
                if delivered {
                    notification.mark_delivered(now);
                    DeliveryCounters::incr(&self.counters.delivered);
                }
                debug!(
                    notification_id = notification.id,
                    status = %notification.status,
                    "Notification sent"
                );
                self.record(&notification).await;
            }
            Err(e) => {
                let decision =
                    self.policy
                        .decide(notification.retry_count, notification.retry_budget(), &e);
                match decision {
                    RetryDecision::Retry { attempt, delay } => {
                        let due_at = chrono::Duration::from_std(delay)
                            .ok()
                            .and_then(|delay| now.checked_add_signed(delay))
                            .unwrap_or(DateTime::<Utc>::MAX_UTC);
                        notification.retry_count = attempt;
                        notification.status = NotificationStatus::Pending;
                        notification.error = Some(e.to_string());
                        notification.scheduled_at = Some(due_at);
                        notification.touch(now);
                        DeliveryCounters::incr(&self.counters.retried);

                        let id = notification.id;
                        warn!(
                            notification_id = id,
                            attempt,
                            max_retries = notification.retry_budget(),
                            "Delivery failed, retrying in {:?}: {}",
                            delay,
                            e
                        );
                        if self.deferred.push(notification, due_at).is_err() {
                            info!(notification_id = id, "Service stopped, retry dropped");
                        }
                    }
                    RetryDecision::GiveUp => {
                        notification.mark_failed(e.to_string(), now);
                        DeliveryCounters::incr(&self.counters.failed);
                        error!(
                            notification_id = notification.id,
                            kind = %notification.kind,
                            retry_count = notification.retry_count,
                            "Notification failed: {}",
                            e
                        );
                        self.record(&notification).await;
                    }
                }
            }
        }
    }

    /// Hand a finished notification to the store, if any.
    pub async fn record(&self, notification: &Notification) {
        if let Some(store) = &self.store
            && let Err(e) = store.record(notification).await
        {
            warn!(
                notification_id = notification.id,
                "Failed to persist notification: {}", e
            );
        }
    }
}

/// Fixed-size pool of delivery workers.
pub struct WorkerPool {
    worker_count: usize,
    /// Workers currently delivering a notification.
    active_workers: Arc<AtomicUsize>,
    cancellation_token: CancellationToken,
    tasks: parking_lot::Mutex<Option<JoinSet<()>>>,
}

impl WorkerPool {
    pub fn new(worker_count: usize, cancellation_token: CancellationToken) -> Self {
        Self {
            worker_count,
            active_workers: Arc::new(AtomicUsize::new(0)),
            cancellation_token,
            tasks: parking_lot::Mutex::new(Some(JoinSet::new())),
        }
    }

    /// Spawn the workers.
    pub(crate) fn start(&self, receiver: SharedReceiver, context: Arc<DeliveryContext>) {
        info!("Starting notification worker pool with {} workers", self.worker_count);

        let mut tasks = self.tasks.lock();
        let Some(join_set) = tasks.as_mut() else {
            warn!("Worker pool already stopped, not starting workers");
            return;
        };

        for i in 0..self.worker_count {
            let receiver = receiver.clone();
            let context = context.clone();
            let cancellation_token = self.cancellation_token.clone();
            let active_workers = self.active_workers.clone();

            join_set.spawn(async move {
                debug!("Notification worker {} started", i);

                loop {
                    // Shutdown wins over a ready item; a dequeued item is always finished.
                    let next = tokio::select! {
                        biased;
                        _ = cancellation_token.cancelled() => None,
                        item = async { receiver.lock().await.recv().await } => item,
                    };
                    let Some(notification) = next else {
                        break;
                    };

                    active_workers.fetch_add(1, Ordering::SeqCst);
                    context.deliver(notification).await;
                    active_workers.fetch_sub(1, Ordering::SeqCst);
                }

                debug!("Notification worker {} shutting down", i);
            });
        }
    }

    /// Signal shutdown and wait for every worker to exit.
    pub async fn stop(&self) {
        self.cancellation_token.cancel();

        let join_set = {
            let mut tasks = self.tasks.lock();
            tasks.take()
        };

        if let Some(mut join_set) = join_set {
            info!("Stopping notification worker pool");
            while let Some(result) = join_set.join_next().await {
                if let Err(e) = result {
                    error!("Notification worker panicked: {}", e);
                }
            }
            info!("Notification worker pool stopped");
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn active_count(&self) -> usize {
        self.active_workers.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        !self.cancellation_token.is_cancelled()
    }
}
