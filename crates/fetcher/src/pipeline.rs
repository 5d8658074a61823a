//! The fetch stage, end to end.
//!
//! Classifies each input URL into a grouping key, scores it, populates
//! one per-host queue per key (score-descending), and drives the
//! scheduler until every queue drains. Exactly one status record leaves
//! the stage per input URL; fetched URLs also leave a content record.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use trawl_core::{
    FetcherPolicy, GroupedUrlDatum, GroupingKey, ScoredUrlDatum, StatusDatum, UrlDatum, UrlStatus,
};

use crate::grouping::GroupingKeyGenerator;
use crate::http::{Fetcher, RobotsFetcher};
use crate::manager::FetcherManager;
use crate::queue::host::PerHostQueue;
use crate::queue::manager::QueueManager;
use crate::score::ScoreGenerator;
use crate::sink::Sink;
use crate::stats::{CountersSnapshot, FetchCounters};

/// Run the fetch stage over a batch of URLs.
///
/// Per-URL failures never abort the stage; they surface on the status
/// stream. The returned snapshot aggregates every disposition.
pub async fn run_fetch_stage<R: RobotsFetcher>(
    urls: impl IntoIterator<Item = UrlDatum>, keygen: &mut GroupingKeyGenerator<R>,
    scorer: &dyn ScoreGenerator, policy: Arc<FetcherPolicy>, fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn Sink>,
) -> CountersSnapshot {
    let counters = Arc::new(FetchCounters::default());
    let mut groups: HashMap<GroupingKey, Vec<ScoredUrlDatum>> = HashMap::new();

    for datum in urls {
        let key = match keygen.key_for(&datum).await {
            Ok(key) => key,
            Err(e) => {
                counters.record(UrlStatus::FetchError);
                sink.emit_status(
                    StatusDatum::new(datum.url, UrlStatus::FetchError, datum.metadata)
                        .with_message(e.to_string()),
                );
                continue;
            }
        };

        if let Some(status) = key.sentinel_status() {
            counters.record(status);
            sink.emit_status(StatusDatum::new(datum.url, status, datum.metadata));
            continue;
        }

        let grouped = GroupedUrlDatum::new(datum, key);
        let score = scorer.score(&grouped);
        if score < 0.0 {
            counters.record(UrlStatus::Skipped);
            sink.emit_status(StatusDatum::new(
                grouped.datum.url,
                UrlStatus::Skipped,
                grouped.datum.metadata,
            ));
            continue;
        }

        groups
            .entry(grouped.key.clone())
            .or_default()
            .push(ScoredUrlDatum::new(grouped, score));
    }

    let queues = Arc::new(QueueManager::new());
    for (key, mut items) in groups {
        items.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        let queue = Arc::new(PerHostQueue::new(key, policy.clone(), sink.clone(), counters.clone()));
        for item in items {
            if !queue.offer(item) {
                tracing::warn!(key = %queue.key(), "queue rejected URL during ingestion");
            }
        }
        queues.offer(queue);
    }

    let manager = FetcherManager::new(fetcher, queues, sink.clone(), policy, counters.clone());
    manager.run().await;

    counters.snapshot()
}
