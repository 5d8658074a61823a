//! Policy validation rules.
//!
//! Applied after a `FetcherPolicy` has been loaded from environment,
//! file, defaults, or a keyed job-configuration record.

use thiserror::Error;

use crate::policy::FetcherPolicy;

/// Crawl-delay ceiling; anything longer starves the run.
const MAX_CRAWL_DELAY_MS: u64 = 300_000;

/// Policy validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load policy: {0}")]
    LoadFailed(String),

    #[error("invalid policy: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required policy field: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl FetcherPolicy {
    /// Validate policy values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_content_size` is 0 or exceeds 64MB
    /// - `request_timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `crawl_delay_ms` exceeds 5 minutes
    /// - `threads_per_host`, `max_threads`, or `queue_mem_capacity` is 0
    /// - the user agent name is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_content_size == 0 {
            return Err(ConfigError::Invalid {
                field: "max_content_size".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.max_content_size > 64 * 1024 * 1024 {
            return Err(ConfigError::Invalid {
                field: "max_content_size".into(),
                reason: "must not exceed 64MB".into(),
            });
        }

        if self.request_timeout_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }
        if self.request_timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.crawl_delay_ms > MAX_CRAWL_DELAY_MS {
            return Err(ConfigError::Invalid {
                field: "crawl_delay_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.threads_per_host == 0 {
            return Err(ConfigError::Invalid {
                field: "threads_per_host".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.max_threads == 0 {
            return Err(ConfigError::Invalid { field: "max_threads".into(), reason: "must be at least 1".into() });
        }
        if self.queue_mem_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "queue_mem_capacity".into(),
                reason: "must be at least 1".into(),
            });
        }

        if self.user_agent.agent_name.is_empty() {
            return Err(ConfigError::Invalid {
                field: "user_agent.agent_name".into(),
                reason: "must not be empty".into(),
            });
        }

        if self.threads_per_host > 1 && self.crawl_delay_ms > 0 {
            tracing::warn!(
                threads_per_host = self.threads_per_host,
                crawl_delay_ms = self.crawl_delay_ms,
                "threads_per_host > 1 with a crawl delay; dispatches stay spaced by the delay"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_policy() {
        let policy = FetcherPolicy::default();
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_validate_max_content_size_zero() {
        let policy = FetcherPolicy { max_content_size: 0, ..Default::default() };
        let result = policy.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_content_size"));
    }

    #[test]
    fn test_validate_max_content_size_exceeds_limit() {
        let policy = FetcherPolicy { max_content_size: 65 * 1024 * 1024, ..Default::default() };
        let result = policy.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_content_size"));
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let policy = FetcherPolicy { request_timeout_ms: 50, ..Default::default() };
        let result = policy.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "request_timeout_ms"));
    }

    #[test]
    fn test_validate_crawl_delay_exceeds_limit() {
        let policy = FetcherPolicy { crawl_delay_ms: 301_000, ..Default::default() };
        let result = policy.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "crawl_delay_ms"));
    }

    #[test]
    fn test_validate_zero_workers() {
        let policy = FetcherPolicy { max_threads: 0, ..Default::default() };
        assert!(matches!(policy.validate(), Err(ConfigError::Invalid { field, .. }) if field == "max_threads"));

        let policy = FetcherPolicy { threads_per_host: 0, ..Default::default() };
        assert!(matches!(policy.validate(), Err(ConfigError::Invalid { field, .. }) if field == "threads_per_host"));
    }

    #[test]
    fn test_validate_empty_agent_name() {
        let policy = FetcherPolicy {
            user_agent: crate::policy::UserAgent::new("", "", ""),
            ..Default::default()
        };
        let result = policy.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "user_agent.agent_name"));
    }

    #[test]
    fn test_validate_edge_values() {
        let policy = FetcherPolicy {
            max_content_size: 1,
            request_timeout_ms: 100,
            crawl_delay_ms: 300_000,
            queue_mem_capacity: 1,
            ..Default::default()
        };
        assert!(policy.validate().is_ok());
    }
}
