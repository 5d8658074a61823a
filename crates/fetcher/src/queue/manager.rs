//! Ordered collection of per-host queues.
//!
//! Hands the next ready queue to a fetch worker. Queues rotate round
//! robin so no ready queue is starved; time-blocked queues are skipped
//! and revisited once the shortest pending delay expires or a worker
//! completion is signalled.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use trawl_core::GroupingKey;

use crate::queue::host::PerHostQueue;

#[derive(Default)]
pub struct QueueManager {
    state: Mutex<ManagerState>,
    /// Signalled on offers and worker completions.
    notify: Notify,
}

#[derive(Default)]
struct ManagerState {
    queues: HashMap<GroupingKey, Arc<PerHostQueue>>,
    rotation: VecDeque<Arc<PerHostQueue>>,
}

impl QueueManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a queue. Returns false when the key is already present.
    pub fn offer(&self, queue: Arc<PerHostQueue>) -> bool {
        {
            let mut state = self.lock();
            if state.queues.contains_key(queue.key()) {
                return false;
            }
            state.queues.insert(queue.key().clone(), queue.clone());
            state.rotation.push_back(queue);
        }
        self.notify.notify_waiters();
        true
    }

    /// Next queue whose `poll` would succeed now, waiting up to `timeout`
    /// for one to become ready.
    pub async fn take_ready(&self, timeout: Duration) -> Option<Arc<PerHostQueue>> {
        let deadline = Instant::now() + timeout;
        loop {
            let (ready, shortest_delay) = self.scan();
            if ready.is_some() {
                return ready;
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let mut wait = deadline - now;
            if let Some(delay_ms) = shortest_delay {
                wait = wait.min(Duration::from_millis(delay_ms.max(1)));
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// One pass over the rotation: retire drained queues, return the
    /// first ready one (rotated to the back), and report the shortest
    /// pending delay among the time-blocked rest.
    fn scan(&self) -> (Option<Arc<PerHostQueue>>, Option<u64>) {
        let mut state = self.lock();
        let mut shortest_delay: Option<u64> = None;
        for _ in 0..state.rotation.len() {
            let Some(queue) = state.rotation.pop_front() else {
                break;
            };
            if queue.is_empty() {
                state.queues.remove(queue.key());
                tracing::debug!(key = %queue.key(), "queue drained; retired");
                continue;
            }
            match queue.ready_in_ms() {
                Some(0) => {
                    state.rotation.push_back(queue.clone());
                    return (Some(queue), None);
                }
                Some(delay) => {
                    shortest_delay = Some(shortest_delay.map_or(delay, |d| d.min(delay)));
                    state.rotation.push_back(queue);
                }
                None => {
                    // Waiting on a release; a notify will wake us.
                    state.rotation.push_back(queue);
                }
            }
        }
        (None, shortest_delay)
    }

    /// Wake any waiter in `take_ready`; called after each worker completes.
    pub fn notify(&self) {
        self.notify.notify_waiters();
    }

    /// Every tracked queue is drained and idle.
    pub fn is_done(&self) -> bool {
        let state = self.lock();
        state.queues.values().all(|queue| queue.is_empty())
    }

    /// Number of tracked queues.
    pub fn len(&self) -> usize {
        self.lock().queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use trawl_core::{FetcherPolicy, ScoredUrlDatum, UrlDatum};

    use crate::sink::CollectingSink;
    use crate::stats::FetchCounters;

    fn queue_for(domain: &str, delay_ms: u64, urls: usize) -> Arc<PerHostQueue> {
        let key = GroupingKey::fetchable(domain, delay_ms);
        let queue = Arc::new(PerHostQueue::new(
            key.clone(),
            Arc::new(FetcherPolicy::default()),
            Arc::new(CollectingSink::new()),
            Arc::new(FetchCounters::default()),
        ));
        for i in 0..urls {
            queue.offer(ScoredUrlDatum {
                datum: UrlDatum::new(format!("http://{domain}/{i}")),
                key: key.clone(),
                score: 1.0,
            });
        }
        queue
    }

    #[tokio::test]
    async fn test_offer_dedupes_by_key() {
        let manager = QueueManager::new();
        assert!(manager.offer(queue_for("a.com", 0, 1)));
        assert!(!manager.offer(queue_for("a.com", 0, 1)));
        assert!(manager.offer(queue_for("b.com", 0, 1)));
        assert_eq!(manager.len(), 2);
    }

    #[tokio::test]
    async fn test_take_ready_returns_ready_queue() {
        let manager = QueueManager::new();
        manager.offer(queue_for("a.com", 0, 1));

        let queue = manager.take_ready(Duration::from_millis(100)).await.expect("ready queue");
        assert!(queue.poll().is_some());
    }

    #[tokio::test]
    async fn test_take_ready_times_out_when_nothing_tracked() {
        let manager = QueueManager::new();
        let got = manager.take_ready(Duration::from_millis(20)).await;
        assert!(got.is_none());
        assert!(manager.is_done());
    }

    #[tokio::test]
    async fn test_take_ready_rotates_between_queues() {
        let manager = QueueManager::new();
        manager.offer(queue_for("a.com", 0, 2));
        manager.offer(queue_for("b.com", 0, 2));

        let first = manager.take_ready(Duration::from_millis(100)).await.unwrap();
        first.poll().unwrap();
        let second = manager.take_ready(Duration::from_millis(100)).await.unwrap();
        second.poll().unwrap();

        assert_ne!(first.key(), second.key(), "round robin visits both keys");
    }

    #[tokio::test]
    async fn test_take_ready_waits_out_crawl_delay() {
        let manager = QueueManager::new();
        manager.offer(queue_for("a.com", 50, 2));

        let queue = manager.take_ready(Duration::from_millis(100)).await.unwrap();
        queue.poll().unwrap();
        queue.release();

        // Time-blocked now; ready again once the 50ms delay passes.
        let started = std::time::Instant::now();
        let queue = manager.take_ready(Duration::from_secs(2)).await.expect("ready after delay");
        assert!(started.elapsed() >= Duration::from_millis(40), "respected the delay");
        assert!(queue.poll().is_some());
    }

    #[tokio::test]
    async fn test_drained_queues_are_retired() {
        let manager = QueueManager::new();
        manager.offer(queue_for("a.com", 0, 1));

        let queue = manager.take_ready(Duration::from_millis(100)).await.unwrap();
        queue.poll().unwrap();
        queue.release();

        assert!(manager.take_ready(Duration::from_millis(20)).await.is_none());
        assert_eq!(manager.len(), 0);
        assert!(manager.is_done());
    }
}
