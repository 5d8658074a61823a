//! The scheduler loop.
//!
//! One driver task pulls ready queues from the [`QueueManager`] and
//! dispatches fetch workers into a bounded pool. Workers fetch, emit
//! results, release their queue, and signal the manager. The loop ends
//! when every queue is drained and every worker is idle; the crawl
//! deadline ends it indirectly, by draining the queues.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use trawl_core::{FetcherPolicy, StatusDatum, UrlStatus};

use crate::http::Fetcher;
use crate::queue::manager::QueueManager;
use crate::sink::Sink;
use crate::stats::FetchCounters;

/// How long one `take_ready` call waits before the driver re-checks for
/// completion.
const TAKE_READY_TIMEOUT: Duration = Duration::from_millis(250);

/// Drives fetch workers over the queue collection until done.
pub struct FetcherManager {
    fetcher: Arc<dyn Fetcher>,
    queues: Arc<QueueManager>,
    sink: Arc<dyn Sink>,
    policy: Arc<FetcherPolicy>,
    counters: Arc<FetchCounters>,
}

impl FetcherManager {
    pub fn new(
        fetcher: Arc<dyn Fetcher>, queues: Arc<QueueManager>, sink: Arc<dyn Sink>,
        policy: Arc<FetcherPolicy>, counters: Arc<FetchCounters>,
    ) -> Self {
        Self { fetcher, queues, sink, policy, counters }
    }

    /// Run the scheduler loop to completion.
    pub async fn run(&self) {
        let max_threads = self.policy.max_threads;
        let semaphore = Arc::new(Semaphore::new(max_threads));
        let mut workers: JoinSet<()> = JoinSet::new();

        tracing::info!(max_threads, queues = self.queues.len(), "fetcher manager starting");

        loop {
            // Reap workers that already finished; keeps the set small.
            while workers.try_join_next().is_some() {}

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            let Some(queue) = self.queues.take_ready(TAKE_READY_TIMEOUT).await else {
                drop(permit);
                let all_idle = semaphore.available_permits() == max_threads;
                if all_idle && self.queues.is_done() {
                    break;
                }
                continue;
            };

            let Some(url) = queue.poll() else {
                // Lost the race to another worker, or the queue drained
                // on the deadline. Either way the permit goes back.
                drop(permit);
                continue;
            };

            let fetcher = self.fetcher.clone();
            let sink = self.sink.clone();
            let counters = self.counters.clone();
            let queues = self.queues.clone();
            workers.spawn(async move {
                let _permit = permit;
                let outcome = AssertUnwindSafe(fetcher.fetch(&url)).catch_unwind().await;
                match outcome {
                    Ok(fetched) => {
                        let status = StatusDatum::from_fetched(&fetched);
                        counters.record(status.status);
                        sink.emit_fetched(fetched);
                        sink.emit_status(status);
                    }
                    Err(_) => {
                        tracing::error!(url = %url.datum.url, "fetch worker panicked");
                        counters.record(UrlStatus::FetchError);
                        sink.emit_status(
                            StatusDatum::new(
                                url.datum.url.clone(),
                                UrlStatus::FetchError,
                                url.datum.metadata.clone(),
                            )
                            .with_message("fetch worker panicked"),
                        );
                    }
                }
                queue.release();
                queues.notify();
            });
        }

        while workers.join_next().await.is_some() {}

        let totals = self.counters.snapshot();
        tracing::info!(?totals, "fetcher manager finished");
    }
}
