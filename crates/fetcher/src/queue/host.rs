//! Per-host fetch queue.
//!
//! Holds the scored URLs of one grouping key and enforces the key's
//! pacing: at most `threads_per_host` requests in flight, and successive
//! dispatches separated by the crawl delay. Once the crawl end time has
//! passed, the remainder of the queue drains straight to the status sink
//! as aborted.

use std::sync::{Arc, Mutex, MutexGuard};

use trawl_core::{FetcherPolicy, GroupingKey, ScoredUrlDatum, StatusDatum, UrlStatus, now_ms};

use crate::queue::spill::DiskSpillQueue;
use crate::sink::Sink;
use crate::stats::FetchCounters;

pub struct PerHostQueue {
    key: GroupingKey,
    crawl_delay_ms: u64,
    policy: Arc<FetcherPolicy>,
    sink: Arc<dyn Sink>,
    counters: Arc<FetchCounters>,
    state: Mutex<HostState>,
}

struct HostState {
    urls: DiskSpillQueue<ScoredUrlDatum>,
    /// Epoch ms of the most recent dispatch; 0 before the first.
    last_dispatch: i64,
    /// Requests currently in flight for this key.
    num_active: usize,
}

impl PerHostQueue {
    pub fn new(
        key: GroupingKey, policy: Arc<FetcherPolicy>, sink: Arc<dyn Sink>,
        counters: Arc<FetchCounters>,
    ) -> Self {
        let crawl_delay_ms = key.crawl_delay_ms().unwrap_or(policy.crawl_delay_ms);
        let state = Mutex::new(HostState {
            urls: DiskSpillQueue::new(policy.queue_mem_capacity),
            last_dispatch: 0,
            num_active: 0,
        });
        Self { key, crawl_delay_ms, policy, sink, counters, state }
    }

    pub fn key(&self) -> &GroupingKey {
        &self.key
    }

    /// Enqueue one URL. Callers deliver URLs in score-descending order.
    pub fn offer(&self, url: ScoredUrlDatum) -> bool {
        let mut state = self.lock();
        match state.urls.offer(url) {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "failed to enqueue URL");
                false
            }
        }
    }

    /// Take the next URL if this key may dispatch right now.
    ///
    /// Past the crawl end time the whole queue drains as aborted and
    /// `None` is returned.
    pub fn poll(&self) -> Option<ScoredUrlDatum> {
        let mut state = self.lock();
        let now = now_ms();

        if self.policy.past_end(now) {
            self.drain_aborted(&mut state);
            return None;
        }

        if state.num_active >= self.policy.threads_per_host {
            return None;
        }
        if now < state.last_dispatch + self.crawl_delay_ms as i64 {
            return None;
        }

        match state.urls.poll() {
            Ok(Some(url)) => {
                state.num_active += 1;
                state.last_dispatch = now;
                Some(url)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "failed to read queued URL");
                None
            }
        }
    }

    /// Mark one in-flight request complete. Called after the worker has
    /// emitted the fetch result.
    pub fn release(&self) {
        let mut state = self.lock();
        state.num_active = state.num_active.saturating_sub(1);
    }

    /// Drained and idle.
    pub fn is_empty(&self) -> bool {
        let state = self.lock();
        state.urls.is_empty() && state.num_active == 0
    }

    /// Milliseconds until `poll` could yield a URL.
    ///
    /// `Some(0)` means ready now (including a pending deadline drain);
    /// `None` means nothing to dispatch until an offer or a release.
    pub fn ready_in_ms(&self) -> Option<u64> {
        let state = self.lock();
        if state.urls.is_empty() {
            return None;
        }
        let now = now_ms();
        if self.policy.past_end(now) {
            // Ready to drain as aborted.
            return Some(0);
        }
        if state.num_active >= self.policy.threads_per_host {
            return None;
        }
        let next = state.last_dispatch + self.crawl_delay_ms as i64;
        Some(next.saturating_sub(now).max(0) as u64)
    }

    fn drain_aborted(&self, state: &mut MutexGuard<'_, HostState>) {
        let mut drained = 0usize;
        loop {
            match state.urls.poll() {
                Ok(Some(url)) => {
                    drained += 1;
                    self.counters.record(UrlStatus::Aborted);
                    self.sink.emit_status(
                        StatusDatum::new(url.datum.url, UrlStatus::Aborted, url.datum.metadata)
                            .with_message("crawl end time reached"),
                    );
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(key = %self.key, error = %e, "failed to drain queue");
                    state.urls.clear();
                    break;
                }
            }
        }
        if drained > 0 {
            tracing::info!(key = %self.key, drained, "crawl end time reached; queue aborted");
        }
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        // Held only for queue bookkeeping; never across await points.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
