//! Core types for the trawl fetch stage.
//!
//! This crate provides:
//! - The datum types flowing through the stage
//! - Grouping keys identifying physical crawl streams
//! - The fetcher policy with layered loading and validation
//! - Unified error types

pub mod datum;
pub mod error;
pub mod key;
pub mod policy;

pub use datum::{
    FetchStatus, FetchedDatum, GroupedUrlDatum, Headers, Metadata, SKIP_URL_SCORE, ScoredUrlDatum,
    StatusDatum, UrlDatum, UrlStatus, now_ms,
};
pub use error::Error;
pub use key::GroupingKey;
pub use policy::{ConfigError, FetcherPolicy, NO_CRAWL_END_TIME, POLICY_CONFIG_KEY, UserAgent};
