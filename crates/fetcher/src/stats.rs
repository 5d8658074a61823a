//! Run totals.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use trawl_core::UrlStatus;

/// Shared counters updated as dispositions are emitted.
#[derive(Debug, Default)]
pub struct FetchCounters {
    fetched: AtomicU64,
    errors: AtomicU64,
    aborted: AtomicU64,
    skipped: AtomicU64,
    blocked: AtomicU64,
    deferred: AtomicU64,
    unknown_host: AtomicU64,
}

/// Point-in-time copy of [`FetchCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountersSnapshot {
    pub fetched: u64,
    pub errors: u64,
    pub aborted: u64,
    pub skipped: u64,
    pub blocked: u64,
    pub deferred: u64,
    pub unknown_host: u64,
}

impl FetchCounters {
    pub fn record(&self, status: UrlStatus) {
        let counter = match status {
            UrlStatus::Fetched => &self.fetched,
            UrlStatus::FetchError | UrlStatus::Unfetched => &self.errors,
            UrlStatus::Aborted => &self.aborted,
            UrlStatus::Skipped => &self.skipped,
            UrlStatus::Blocked => &self.blocked,
            UrlStatus::Deferred => &self.deferred,
            UrlStatus::UnknownHost => &self.unknown_host,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            fetched: self.fetched.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            unknown_host: self.unknown_host.load(Ordering::Relaxed),
        }
    }
}

impl CountersSnapshot {
    /// Inputs accounted for across every disposition.
    pub fn total(&self) -> u64 {
        self.fetched
            + self.errors
            + self.aborted
            + self.skipped
            + self.blocked
            + self.deferred
            + self.unknown_host
    }
}
