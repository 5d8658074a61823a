//! Crawl policy with layered loading.
//!
//! All global crawl knobs ship as a single [`FetcherPolicy`] record.
//! Loading precedence (highest wins):
//!
//! 1. Environment variables (TRAWL_*)
//! 2. TOML config file (if TRAWL_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! For cross-node transport the record round-trips through a keyed JSON
//! encoding under [`POLICY_CONFIG_KEY`], so workers on other nodes can
//! reconstruct it from the job configuration.

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Well-known key the policy is serialized under in job configuration.
pub const POLICY_CONFIG_KEY: &str = "fetcher.policy";

/// Sentinel crawl end time meaning "never".
pub const NO_CRAWL_END_TIME: i64 = i64::MAX;

/// Crawler identity sent as the User-Agent header.
///
/// Polite crawlers advertise a contact address alongside the agent name so
/// site operators can reach the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAgent {
    /// Agent token, also matched against robots.txt `User-agent` groups.
    pub agent_name: String,
    /// Operator contact email.
    #[serde(default)]
    pub email: String,
    /// Crawler information page.
    #[serde(default)]
    pub web_address: String,
}

impl UserAgent {
    pub fn new(
        agent_name: impl Into<String>, email: impl Into<String>, web_address: impl Into<String>,
    ) -> Self {
        Self { agent_name: agent_name.into(), email: email.into(), web_address: web_address.into() }
    }

    /// Full header value: `Mozilla/5.0 (compatible; <name>; +<url>; <email>)`.
    pub fn value(&self) -> String {
        let mut value = format!("Mozilla/5.0 (compatible; {}", self.agent_name);
        if !self.web_address.is_empty() {
            value.push_str("; +");
            value.push_str(&self.web_address);
        }
        if !self.email.is_empty() {
            value.push_str("; ");
            value.push_str(&self.email);
        }
        value.push(')');
        value
    }
}

impl Default for UserAgent {
    fn default() -> Self {
        Self::new("trawl/0.1", "", "")
    }
}

/// Immutable bundle of global crawl knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetcherPolicy {
    /// Absolute epoch ms after which no new URLs are dispatched.
    ///
    /// Set via TRAWL_CRAWL_END_TIME. Defaults to never.
    #[serde(default = "default_crawl_end_time")]
    pub crawl_end_time: i64,

    /// Minimum acceptable body read rate in bytes/second; 0 disables.
    ///
    /// Set via TRAWL_MIN_RESPONSE_RATE.
    #[serde(default)]
    pub min_response_rate: u64,

    /// Maximum body bytes kept per fetch.
    ///
    /// Set via TRAWL_MAX_CONTENT_SIZE.
    #[serde(default = "default_max_content_size")]
    pub max_content_size: u64,

    /// Default ms between requests to one host, used when robots.txt
    /// carries no `Crawl-delay`.
    ///
    /// Set via TRAWL_CRAWL_DELAY_MS.
    #[serde(default = "default_crawl_delay_ms")]
    pub crawl_delay_ms: u64,

    /// Maximum redirects followed per request.
    ///
    /// Set via TRAWL_MAX_REDIRECTS.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Concurrent requests allowed per grouping key.
    ///
    /// Set via TRAWL_THREADS_PER_HOST.
    #[serde(default = "default_threads_per_host")]
    pub threads_per_host: usize,

    /// Size of the global fetch worker pool.
    ///
    /// Set via TRAWL_MAX_THREADS.
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,

    /// Socket and connect timeout in milliseconds.
    ///
    /// Set via TRAWL_REQUEST_TIMEOUT_MS.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// URLs a per-host queue holds in memory before spilling to disk.
    ///
    /// Set via TRAWL_QUEUE_MEM_CAPACITY.
    #[serde(default = "default_queue_mem_capacity")]
    pub queue_mem_capacity: usize,

    /// Group URLs by resolved IP instead of paid-level domain.
    ///
    /// Set via TRAWL_GROUP_BY_IP.
    #[serde(default)]
    pub group_by_ip: bool,

    /// Crawler identity.
    ///
    /// Set via TRAWL_USER_AGENT__AGENT_NAME etc.
    #[serde(default)]
    pub user_agent: UserAgent,
}

fn default_crawl_end_time() -> i64 {
    NO_CRAWL_END_TIME
}

fn default_max_content_size() -> u64 {
    128 * 1024
}

fn default_crawl_delay_ms() -> u64 {
    30_000
}

fn default_max_redirects() -> usize {
    5
}

fn default_threads_per_host() -> usize {
    1
}

fn default_max_threads() -> usize {
    10
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_queue_mem_capacity() -> usize {
    100
}

impl Default for FetcherPolicy {
    fn default() -> Self {
        Self {
            crawl_end_time: default_crawl_end_time(),
            min_response_rate: 0,
            max_content_size: default_max_content_size(),
            crawl_delay_ms: default_crawl_delay_ms(),
            max_redirects: default_max_redirects(),
            threads_per_host: default_threads_per_host(),
            max_threads: default_max_threads(),
            request_timeout_ms: default_request_timeout_ms(),
            queue_mem_capacity: default_queue_mem_capacity(),
            group_by_ip: false,
            user_agent: UserAgent::default(),
        }
    }
}

impl FetcherPolicy {
    /// Default per-host spacing as a Duration.
    pub fn crawl_delay(&self) -> Duration {
        Duration::from_millis(self.crawl_delay_ms)
    }

    /// Socket/connect timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// True once the crawl budget has expired at `now_ms`.
    pub fn past_end(&self, now_ms: i64) -> bool {
        now_ms > self.crawl_end_time
    }

    /// Load the policy from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source cannot be read or parsed, or if
    /// validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("TRAWL_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("TRAWL_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let policy: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        policy.validate()?;

        Ok(policy)
    }

    /// Serialize as the keyed job-configuration record.
    pub fn to_keyed_record(&self) -> serde_json::Value {
        serde_json::json!({ POLICY_CONFIG_KEY: self })
    }

    /// Reconstruct from a keyed job-configuration record.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the key is absent, the payload does not
    /// decode, or validation fails.
    pub fn from_keyed_record(record: &serde_json::Value) -> Result<Self, ConfigError> {
        let payload = record.get(POLICY_CONFIG_KEY).ok_or_else(|| ConfigError::Missing {
            field: POLICY_CONFIG_KEY.into(),
            hint: "job configuration does not carry a fetcher policy".into(),
        })?;
        let policy: Self = serde_json::from_value(payload.clone())
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }
}
