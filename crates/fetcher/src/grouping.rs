//! Grouping key assignment.
//!
//! Folds DNS resolution, robots.txt acquisition, and robots rule
//! interpretation into one classification per URL. Runs inside a single
//! pipeline task, so the caches are plain single-threaded state.

use std::collections::HashSet;
use std::num::NonZeroUsize;

use lru::LruCache;
use url::Url;

use trawl_core::{Error, FetcherPolicy, GroupingKey, UrlDatum};

use crate::http::RobotsFetcher;
use crate::normalize::{canonicalize, robots_url};
use crate::robots::RobotsRules;

/// Upper bound on cached host rules; sized to expected unique-host
/// cardinality of one partition.
pub const RULES_CACHE_CAPACITY: usize = 10_000;

/// Classifies URLs into grouping keys.
pub struct GroupingKeyGenerator<R: RobotsFetcher> {
    robots_fetcher: R,
    agent_name: String,
    default_crawl_delay_ms: u64,
    /// Group by resolved IP instead of paid-level domain.
    group_by_ip: bool,
    bad_hosts: HashSet<String>,
    rules: LruCache<String, RobotsRules>,
}

impl<R: RobotsFetcher> GroupingKeyGenerator<R> {
    pub fn new(robots_fetcher: R, policy: &FetcherPolicy) -> Self {
        Self {
            robots_fetcher,
            agent_name: policy.user_agent.agent_name.clone(),
            default_crawl_delay_ms: policy.crawl_delay_ms,
            group_by_ip: policy.group_by_ip,
            bad_hosts: HashSet::new(),
            rules: LruCache::new(NonZeroUsize::new(RULES_CACHE_CAPACITY).unwrap()),
        }
    }

    /// Classify one URL.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` for a URL that does not parse; the
    /// caller reports it on the status stream as a fetch error.
    pub async fn key_for(&mut self, datum: &UrlDatum) -> Result<GroupingKey, Error> {
        let url = canonicalize(&datum.url)?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::InvalidUrl(format!("no host in {}", datum.url)))?
            .to_string();

        if self.bad_hosts.contains(&host) {
            return Ok(GroupingKey::UnknownHost);
        }

        let domain = match self.grouping_domain(&url, &host).await {
            Some(domain) => domain,
            None => {
                self.bad_hosts.insert(host);
                return Ok(GroupingKey::UnknownHost);
            }
        };

        let rules = match self.rules.get(&host) {
            Some(rules) => rules.clone(),
            None => {
                let fetched = self.fetch_rules(&url).await;
                self.rules.put(host.clone(), fetched.clone());
                fetched
            }
        };

        if rules.defer_visits() {
            return Ok(GroupingKey::Deferred);
        }
        if !rules.is_allowed(&url) {
            return Ok(GroupingKey::Blocked);
        }
        Ok(GroupingKey::fetchable(domain, rules.crawl_delay_ms()))
    }

    /// The destination half of the key: PLD, or resolved IP when grouping
    /// by IP. None means the host is unresolvable.
    async fn grouping_domain(&self, url: &Url, host: &str) -> Option<String> {
        if !self.group_by_ip {
            return Some(psl::domain_str(host).unwrap_or(host).to_string());
        }

        let port = url.port_or_known_default().unwrap_or(80);
        match tokio::net::lookup_host((host, port)).await {
            Ok(mut addrs) => addrs.next().map(|addr| addr.ip().to_string()),
            Err(e) => {
                tracing::debug!(host, error = %e, "DNS resolution failed");
                None
            }
        }
    }

    async fn fetch_rules(&self, url: &Url) -> RobotsRules {
        let robots = robots_url(url);
        match self.robots_fetcher.get_bytes(&robots).await {
            Ok(bytes) => {
                RobotsRules::from_content(&self.agent_name, &bytes, self.default_crawl_delay_ms)
            }
            Err(err) => {
                tracing::debug!(robots_url = %robots, error = %err, "robots.txt fetch failed");
                RobotsRules::from_fetch_error(&err, self.default_crawl_delay_ms)
            }
        }
    }
}
