//! Deferred delivery.
//!
//! Scheduled notifications and retries waiting out their delay live in one
//! min-heap ordered by due time. A single dispatcher task sleeps until the
//! earliest item is due and then moves it into the delivery queue.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::types::Notification;
use crate::clock::Clock;
use crate::{Error, Result};

/// How long the dispatcher waits before retrying a due item the queue
/// had no room for.
pub const QUEUE_FULL_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug)]
struct Entry {
    due_at: DateTime<Utc>,
    sequence: u64,
    notification: Notification,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due_at == other.due_at && self.sequence == other.sequence
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed so the std max-heap pops the earliest entry first.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .due_at
            .cmp(&self.due_at)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

struct Inner {
    heap: BinaryHeap<Entry>,
    closed: bool,
}

/// Heap of notifications waiting for their due time.
pub struct DeferredQueue {
    inner: Mutex<Inner>,
    sequence: AtomicU64,
    wake: Notify,
}

impl Default for DeferredQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                closed: false,
            }),
            sequence: AtomicU64::new(0),
            wake: Notify::new(),
        }
    }

    /// Hold `notification` until `due_at`.
    ///
    /// Items with equal due times are released in insertion order.
    pub fn push(&self, notification: Notification, due_at: DateTime<Utc>) -> Result<()> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.insert(Entry {
            due_at,
            sequence,
            notification,
        })
    }

    fn insert(&self, entry: Entry) -> Result<()> {
        let new_head = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(Error::ServiceStopped);
            }
            let new_head = inner.heap.peek().is_none_or(|head| entry > *head);
            inner.heap.push(entry);
            new_head
        };
        if new_head {
            self.wake.notify_one();
        }
        Ok(())
    }

    /// Remove a waiting notification by id.
    pub fn cancel(&self, id: u64) -> Option<Notification> {
        let mut inner = self.inner.lock();
        let mut removed = None;
        let entries = std::mem::take(&mut inner.heap).into_vec();
        for entry in entries {
            if removed.is_none() && entry.notification.id == id {
                removed = Some(entry.notification);
            } else {
                inner.heap.push(entry);
            }
        }
        removed
    }

    pub fn contains(&self, id: u64) -> bool {
        self.inner
            .lock()
            .heap
            .iter()
            .any(|entry| entry.notification.id == id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().heap.is_empty()
    }

    /// Due time of the earliest item.
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().heap.peek().map(|entry| entry.due_at)
    }

    fn pop_due(&self, now: DateTime<Utc>) -> Option<Entry> {
        let mut inner = self.inner.lock();
        if inner.heap.peek().is_some_and(|head| head.due_at <= now) {
            inner.heap.pop()
        } else {
            None
        }
    }

    /// Put back an entry the dispatcher could not hand off, keeping its
    /// original position.
    fn restore(&self, entry: Entry) {
        let mut inner = self.inner.lock();
        if !inner.closed {
            inner.heap.push(entry);
        }
    }

    /// Refuse further items and drop everything still waiting.
    ///
    /// Returns the dropped notifications.
    pub fn close(&self) -> Vec<Notification> {
        let mut inner = self.inner.lock();
        inner.closed = true;
        std::mem::take(&mut inner.heap)
            .into_sorted_vec()
            .into_iter()
            .rev()
            .map(|entry| entry.notification)
            .collect()
    }
}

/// Move due notifications from `deferred` into the delivery queue until
/// `cancellation_token` fires or the queue is closed.
pub async fn run_dispatcher(
    deferred: Arc<DeferredQueue>,
    queue: mpsc::Sender<Notification>,
    clock: Arc<dyn Clock>,
    cancellation_token: CancellationToken,
) {
    debug!("Deferred dispatcher started");

    loop {
        let mut backoff = false;
        let now = clock.now();

        while let Some(entry) = deferred.pop_due(now) {
            let id = entry.notification.id;
            let Entry {
                due_at,
                sequence,
                notification,
            } = entry;
            match queue.try_send(notification) {
                Ok(()) => debug!(notification_id = id, "Released deferred notification"),
                Err(TrySendError::Full(notification)) => {
                    debug!(
                        notification_id = id,
                        "Delivery queue full, holding deferred notification"
                    );
                    deferred.restore(Entry {
                        due_at,
                        sequence,
                        notification,
                    });
                    backoff = true;
                    break;
                }
                Err(TrySendError::Closed(_)) => {
                    warn!(
                        notification_id = id,
                        "Delivery queue closed, dropping deferred notification"
                    );
                    info!("Deferred dispatcher stopped");
                    return;
                }
            }
        }

        let wait = if backoff {
            Some(QUEUE_FULL_BACKOFF)
        } else {
            deferred.next_due().map(|at| clock.until(at))
        };

        let sleep = async {
            match wait {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => break,
            _ = deferred.wake.notified() => {}
            _ = sleep => {}
        }
    }

    info!("Deferred dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::notification::{NotificationTrigger, NotificationType};

    fn notification() -> Notification {
        Notification::new(NotificationType::InApp, NotificationTrigger::Custom).for_task(1, 1)
    }

    #[test]
    fn test_earliest_due_first_then_insertion_order() {
        let queue = DeferredQueue::new();
        let now = Utc::now();
        let late = notification();
        let first = notification();
        let second = notification();
        let (late_id, first_id, second_id) = (late.id, first.id, second.id);

        queue.push(late, now + chrono::Duration::seconds(30)).unwrap();
        queue.push(first, now + chrono::Duration::seconds(5)).unwrap();
        queue.push(second, now + chrono::Duration::seconds(5)).unwrap();

        assert_eq!(queue.next_due(), Some(now + chrono::Duration::seconds(5)));
        assert!(queue.pop_due(now).is_none());

        let later = now + chrono::Duration::seconds(60);
        let order: Vec<u64> = std::iter::from_fn(|| queue.pop_due(later))
            .map(|e| e.notification.id)
            .collect();
        assert_eq!(order, vec![first_id, second_id, late_id]);
    }

    #[test]
    fn test_cancel_removes_only_target() {
        let queue = DeferredQueue::new();
        let now = Utc::now();
        let keep = notification();
        let drop_me = notification();
        let (keep_id, drop_id) = (keep.id, drop_me.id);
        queue.push(keep, now).unwrap();
        queue.push(drop_me, now).unwrap();

        assert_eq!(queue.cancel(drop_id).map(|n| n.id), Some(drop_id));
        assert!(queue.cancel(drop_id).is_none());
        assert!(queue.contains(keep_id));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_close_rejects_new_items() {
        let queue = DeferredQueue::new();
        queue.push(notification(), Utc::now()).unwrap();

        let dropped = queue.close();
        assert_eq!(dropped.len(), 1);
        assert!(queue.is_empty());
        assert!(matches!(
            queue.push(notification(), Utc::now()),
            Err(Error::ServiceStopped)
        ));
    }

    #[tokio::test]
    async fn test_dispatcher_releases_due_items() {
        let deferred = Arc::new(DeferredQueue::new());
        let (tx, mut rx) = mpsc::channel(4);
        let token = CancellationToken::new();
        let handle = tokio::spawn(run_dispatcher(
            deferred.clone(),
            tx,
            Arc::new(SystemClock),
            token.clone(),
        ));

        let n = notification();
        let id = n.id;
        deferred
            .push(n, Utc::now() + chrono::Duration::milliseconds(20))
            .unwrap();

        let released = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(released.id, id);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_dispatcher_holds_items_while_queue_full() {
        let deferred = Arc::new(DeferredQueue::new());
        let (tx, mut rx) = mpsc::channel(1);
        tx.try_send(notification()).unwrap();

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_dispatcher(
            deferred.clone(),
            tx,
            Arc::new(SystemClock),
            token.clone(),
        ));

        let n = notification();
        let id = n.id;
        deferred.push(n, Utc::now()).unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(deferred.contains(id));

        rx.recv().await.unwrap();
        let released = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(released.id, id);
        assert!(deferred.is_empty());

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_dispatcher_stops_before_due_time() {
        let deferred = Arc::new(DeferredQueue::new());
        let (tx, mut rx) = mpsc::channel(4);
        let token = CancellationToken::new();
        let handle = tokio::spawn(run_dispatcher(
            deferred.clone(),
            tx,
            Arc::new(SystemClock),
            token.clone(),
        ));

        deferred
            .push(notification(), Utc::now() + chrono::Duration::milliseconds(100))
            .unwrap();
        token.cancel();
        handle.await.unwrap();
        assert_eq!(deferred.close().len(), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(rx.try_recv().is_err());
    }
}
