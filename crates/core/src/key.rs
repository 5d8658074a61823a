//! Grouping keys identifying physical crawl streams.
//!
//! A key folds destination and pacing into one value: URLs sharing a key
//! are fetched through the same per-host queue, serialized and spaced by
//! the key's crawl delay. Four sentinel variants mark URLs that bypass
//! fetching and go straight to the status sink.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::datum::UrlStatus;

/// Legacy wire names for the sentinel keys.
pub const UNKNOWN_HOST_KEY: &str = "UNKNOWN_HOST";
pub const BLOCKED_KEY: &str = "BLOCKED";
pub const DEFERRED_KEY: &str = "DEFERRED";
pub const SKIPPED_KEY: &str = "SKIPPED";

/// Disposition of a URL after DNS resolution and robots evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupingKey {
    /// Fetchable through the queue for `domain`, paced at `crawl_delay_ms`.
    Fetchable { domain: String, crawl_delay_ms: u64 },
    /// Host failed DNS resolution.
    UnknownHost,
    /// robots.txt forbids the crawl.
    Blocked,
    /// robots.txt could not be fetched; try the host again in a later run.
    Deferred,
    /// Scored out of the run.
    Skipped,
}

impl GroupingKey {
    pub fn fetchable(domain: impl Into<String>, crawl_delay_ms: u64) -> Self {
        Self::Fetchable { domain: domain.into(), crawl_delay_ms }
    }

    pub fn is_fetchable(&self) -> bool {
        matches!(self, Self::Fetchable { .. })
    }

    /// Crawl delay carried by a fetchable key.
    pub fn crawl_delay_ms(&self) -> Option<u64> {
        match self {
            Self::Fetchable { crawl_delay_ms, .. } => Some(*crawl_delay_ms),
            _ => None,
        }
    }

    /// The status a sentinel key resolves to, bypassing the fetch engine.
    pub fn sentinel_status(&self) -> Option<UrlStatus> {
        match self {
            Self::Fetchable { .. } => None,
            Self::UnknownHost => Some(UrlStatus::UnknownHost),
            Self::Blocked => Some(UrlStatus::Blocked),
            Self::Deferred => Some(UrlStatus::Deferred),
            Self::Skipped => Some(UrlStatus::Skipped),
        }
    }
}

impl fmt::Display for GroupingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetchable { domain, crawl_delay_ms } => write!(f, "{domain}-{crawl_delay_ms}"),
            Self::UnknownHost => f.write_str(UNKNOWN_HOST_KEY),
            Self::Blocked => f.write_str(BLOCKED_KEY),
            Self::Deferred => f.write_str(DEFERRED_KEY),
            Self::Skipped => f.write_str(SKIPPED_KEY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetchable_wire_form() {
        let key = GroupingKey::fetchable("example.co.uk", 1500);
        assert_eq!(key.to_string(), "example.co.uk-1500");
        assert!(key.is_fetchable());
        assert_eq!(key.crawl_delay_ms(), Some(1500));
        assert_eq!(key.sentinel_status(), None);
    }

    #[test]
    fn test_sentinel_wire_forms() {
        assert_eq!(GroupingKey::UnknownHost.to_string(), "UNKNOWN_HOST");
        assert_eq!(GroupingKey::Blocked.to_string(), "BLOCKED");
        assert_eq!(GroupingKey::Deferred.to_string(), "DEFERRED");
        assert_eq!(GroupingKey::Skipped.to_string(), "SKIPPED");
    }

    #[test]
    fn test_sentinel_statuses() {
        assert_eq!(GroupingKey::UnknownHost.sentinel_status(), Some(UrlStatus::UnknownHost));
        assert_eq!(GroupingKey::Blocked.sentinel_status(), Some(UrlStatus::Blocked));
        assert_eq!(GroupingKey::Deferred.sentinel_status(), Some(UrlStatus::Deferred));
        assert_eq!(GroupingKey::Skipped.sentinel_status(), Some(UrlStatus::Skipped));
    }

    #[test]
    fn test_keys_with_same_domain_and_delay_group_together() {
        let a = GroupingKey::fetchable("example.com", 1000);
        let b = GroupingKey::fetchable("example.com", 1000);
        let c = GroupingKey::fetchable("example.com", 2000);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
