//! The fetch stage of a polite batch web crawler.
//!
//! This crate provides the HTTP fetch engine, robots.txt rules, grouping
//! key assignment, the two-level pacing scheduler, and the stage driver
//! that ties them together. Datum and policy types live in `trawl-core`.

pub mod grouping;
pub mod http;
pub mod manager;
pub mod normalize;
pub mod pipeline;
pub mod queue;
pub mod robots;
pub mod score;
pub mod sink;
pub mod stats;

pub use grouping::GroupingKeyGenerator;
pub use http::{Fetcher, HttpFetcher, RobotsFetcher};
pub use manager::FetcherManager;
pub use pipeline::run_fetch_stage;
pub use queue::{DiskSpillQueue, PerHostQueue, QueueManager};
pub use robots::RobotsRules;
pub use score::{FixedScorer, LastFetchedScorer, ScoreGenerator};
pub use sink::{CollectingSink, Sink};
pub use stats::{CountersSnapshot, FetchCounters};
