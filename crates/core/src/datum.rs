//! Tuple types flowing through the fetch stage.
//!
//! Every input [`UrlDatum`] leaves the stage as exactly one [`StatusDatum`];
//! URLs that reached the fetch engine additionally produce one
//! [`FetchedDatum`]. Metadata attached to an input datum is carried
//! byte-identical onto every output tuple derived from it.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::key::GroupingKey;

/// Opaque per-URL metadata propagated through the pipeline unchanged.
pub type Metadata = BTreeMap<String, String>;

/// Score sentinel that omits a URL from fetching entirely.
pub const SKIP_URL_SCORE: f64 = -1.0;

/// Current epoch time in milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Lifecycle status of a URL within one crawl run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UrlStatus {
    Unfetched,
    Fetched,
    FetchError,
    Aborted,
    Blocked,
    UnknownHost,
    Deferred,
    Skipped,
}

/// Outcome of a single fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchStatus {
    Fetched,
    Error,
    Aborted,
}

impl From<FetchStatus> for UrlStatus {
    fn from(status: FetchStatus) -> Self {
        match status {
            FetchStatus::Fetched => UrlStatus::Fetched,
            FetchStatus::Error => UrlStatus::FetchError,
            FetchStatus::Aborted => UrlStatus::Aborted,
        }
    }
}

/// A candidate URL as delivered by the upstream pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlDatum {
    /// The URL to fetch.
    pub url: String,
    /// Epoch ms of the last successful fetch; 0 when never fetched.
    #[serde(default)]
    pub last_fetched: i64,
    /// Epoch ms of the last observed content change; 0 when unknown.
    #[serde(default)]
    pub last_updated: i64,
    /// Status as of the previous run.
    #[serde(default = "unfetched")]
    pub status: UrlStatus,
    /// Pipeline metadata, propagated verbatim.
    #[serde(default)]
    pub metadata: Metadata,
}

fn unfetched() -> UrlStatus {
    UrlStatus::Unfetched
}

impl UrlDatum {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            last_fetched: 0,
            last_updated: 0,
            status: UrlStatus::Unfetched,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A [`UrlDatum`] that has been assigned a grouping key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedUrlDatum {
    pub datum: UrlDatum,
    pub key: GroupingKey,
}

impl GroupedUrlDatum {
    pub fn new(datum: UrlDatum, key: GroupingKey) -> Self {
        Self { datum, key }
    }
}

/// A grouped URL with a fetch priority in `[0.0, 1.0]`.
///
/// [`SKIP_URL_SCORE`] (negative) marks a URL that must not be fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredUrlDatum {
    pub datum: UrlDatum,
    pub key: GroupingKey,
    pub score: f64,
}

impl ScoredUrlDatum {
    pub fn new(grouped: GroupedUrlDatum, score: f64) -> Self {
        Self { datum: grouped.datum, key: grouped.key, score }
    }
}

/// Insertion-ordered header multimap with case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, preserving the order values arrived in.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value for `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of one fetch attempt, emitted to the content sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedDatum {
    /// The URL as requested.
    pub url: String,
    /// Final URL after the client followed redirects.
    pub redirected_url: String,
    pub status: FetchStatus,
    /// HTTP status code, 0 when no response was received.
    pub status_code: u16,
    pub headers: Headers,
    /// Body bytes, possibly truncated to the policy cap.
    pub content: Vec<u8>,
    pub content_type: Option<String>,
    /// True when the server offered more bytes than the policy cap.
    pub truncated: bool,
    /// Measured body read rate in bytes/second.
    pub read_rate: u64,
    /// Epoch ms when the fetch completed.
    pub fetched_at: i64,
    /// Failure detail for ERROR and ABORTED outcomes.
    pub message: Option<String>,
    pub metadata: Metadata,
}

impl FetchedDatum {
    /// Datum for a request that never produced a response.
    pub fn failure(url: impl Into<String>, message: impl Into<String>, metadata: Metadata) -> Self {
        let url = url.into();
        Self {
            url: url.clone(),
            redirected_url: url,
            status: FetchStatus::Error,
            status_code: 0,
            headers: Headers::new(),
            content: Vec::new(),
            content_type: None,
            truncated: false,
            read_rate: 0,
            fetched_at: now_ms(),
            message: Some(message.into()),
            metadata,
        }
    }
}

/// Per-URL disposition record, emitted to the status sink for every input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDatum {
    pub url: String,
    pub status: UrlStatus,
    /// HTTP status code, 0 when the URL never reached the wire.
    pub status_code: u16,
    pub message: Option<String>,
    /// Epoch ms when the disposition was decided.
    pub completed_at: i64,
    pub metadata: Metadata,
}

impl StatusDatum {
    pub fn new(url: impl Into<String>, status: UrlStatus, metadata: Metadata) -> Self {
        Self {
            url: url.into(),
            status,
            status_code: 0,
            message: None,
            completed_at: now_ms(),
            metadata,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Status record mirroring a completed fetch attempt.
    pub fn from_fetched(fetched: &FetchedDatum) -> Self {
        Self {
            url: fetched.url.clone(),
            status: fetched.status.into(),
            status_code: fetched.status_code,
            message: fetched.message.clone(),
            completed_at: fetched.fetched_at,
            metadata: fetched.metadata.clone(),
        }
    }
}
