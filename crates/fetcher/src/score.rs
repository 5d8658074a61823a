//! Fetch prioritization.
//!
//! Scores order URLs within one per-host queue; [`SKIP_URL_SCORE`]
//! removes a URL from the run entirely.

use std::time::Duration;

use trawl_core::{GroupedUrlDatum, SKIP_URL_SCORE, now_ms};

/// Assigns a fetch priority in `[0.0, 1.0]`, or [`SKIP_URL_SCORE`].
pub trait ScoreGenerator: Send + Sync {
    fn score(&self, grouped: &GroupedUrlDatum) -> f64;
}

/// Scores by time since the last fetch, saturating at 1.0 once the URL
/// has gone unfetched for the full window. Never-fetched URLs score 1.0.
pub struct LastFetchedScorer {
    window: Duration,
}

impl LastFetchedScorer {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }
}

impl Default for LastFetchedScorer {
    fn default() -> Self {
        // A week without a refetch earns full priority.
        Self::new(Duration::from_secs(7 * 24 * 60 * 60))
    }
}

impl ScoreGenerator for LastFetchedScorer {
    fn score(&self, grouped: &GroupedUrlDatum) -> f64 {
        if grouped.datum.last_fetched <= 0 {
            return 1.0;
        }
        let elapsed_ms = (now_ms() - grouped.datum.last_fetched).max(0) as f64;
        let window_ms = (self.window.as_millis().max(1)) as f64;
        (elapsed_ms / window_ms).min(1.0)
    }
}

/// Same score for every URL; handy for tests and one-off batch runs.
pub struct FixedScorer(pub f64);

impl ScoreGenerator for FixedScorer {
    fn score(&self, _grouped: &GroupedUrlDatum) -> f64 {
        self.0
    }
}

/// A scorer that skips everything.
pub fn skip_all() -> FixedScorer {
    FixedScorer(SKIP_URL_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;

    use trawl_core::{GroupingKey, UrlDatum};

    fn grouped(last_fetched: i64) -> GroupedUrlDatum {
        let mut datum = UrlDatum::new("http://example.com/");
        datum.last_fetched = last_fetched;
        GroupedUrlDatum::new(datum, GroupingKey::fetchable("example.com", 1000))
    }

    #[test]
    fn test_never_fetched_scores_full() {
        let scorer = LastFetchedScorer::default();
        assert_eq!(scorer.score(&grouped(0)), 1.0);
    }

    #[test]
    fn test_recent_fetch_scores_low() {
        let scorer = LastFetchedScorer::new(Duration::from_secs(3600));
        let score = scorer.score(&grouped(now_ms() - 36_000));
        assert!(score < 0.05, "score was {score}");
        assert!(score >= 0.0);
    }

    #[test]
    fn test_stale_fetch_saturates() {
        let scorer = LastFetchedScorer::new(Duration::from_secs(60));
        let score = scorer.score(&grouped(now_ms() - 600_000));
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_skip_all() {
        assert!(skip_all().score(&grouped(0)) < 0.0);
    }
}
