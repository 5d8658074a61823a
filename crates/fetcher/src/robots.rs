//! Robots Exclusion Protocol rules for one host.
//!
//! Parses a robots.txt body for a user agent: directives grouped by
//! `User-agent` (with `*` as fallback), `Allow`/`Disallow` path prefixes
//! with longest-match precedence, and `Crawl-delay` in seconds.
//!
//! A rules value can also be derived from a failed robots.txt fetch:
//! - 401/403: the site forbids crawling; nothing is allowed.
//! - 429, 5xx, network failure: defer the host to a later run.
//! - any other 4xx: no robots.txt, no restrictions.

use url::Url;

use trawl_core::Error;

/// One `Allow`/`Disallow` line, kept in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PathRule {
    prefix: String,
    allow: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Access {
    All,
    None,
    Rules(Vec<PathRule>),
}

/// Parsed robots policy for one host, as seen by one user agent.
#[derive(Debug, Clone, PartialEq)]
pub struct RobotsRules {
    access: Access,
    crawl_delay_ms: u64,
    defer_visits: bool,
}

impl RobotsRules {
    /// No restrictions; used when the host serves no robots.txt.
    pub fn allow_all(crawl_delay_ms: u64) -> Self {
        Self { access: Access::All, crawl_delay_ms, defer_visits: false }
    }

    /// Site forbids crawling outright.
    pub fn allow_none(crawl_delay_ms: u64) -> Self {
        Self { access: Access::None, crawl_delay_ms, defer_visits: false }
    }

    /// robots.txt was unavailable; the host should be retried in a later run.
    pub fn deferred(crawl_delay_ms: u64) -> Self {
        Self { access: Access::None, crawl_delay_ms, defer_visits: true }
    }

    /// Parse a robots.txt body for `agent_name`.
    ///
    /// `default_crawl_delay_ms` applies when the matched group carries no
    /// `Crawl-delay` directive.
    pub fn from_content(agent_name: &str, body: &[u8], default_crawl_delay_ms: u64) -> Self {
        let text = String::from_utf8_lossy(body);
        let agent = agent_name.to_lowercase();

        let mut specific = GroupRules::default();
        let mut wildcard = GroupRules::default();

        // Consecutive User-agent lines name the targets of the group that
        // follows; the first rule directive closes the target list.
        let mut targets_open = true;
        let mut group_specific = false;
        let mut group_wildcard = false;

        for raw in text.lines() {
            let line = match raw.split_once('#') {
                Some((before, _)) => before.trim(),
                None => raw.trim(),
            };
            if line.is_empty() {
                continue;
            }
            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" | "useragent" => {
                    if !targets_open {
                        targets_open = true;
                        group_specific = false;
                        group_wildcard = false;
                    }
                    let token = value.to_lowercase();
                    if token == "*" {
                        group_wildcard = true;
                    } else if !token.is_empty() && agent.contains(&token) {
                        group_specific = true;
                    }
                }
                "disallow" | "allow" => {
                    targets_open = false;
                    let allow = directive.starts_with('a');
                    // An empty Disallow means "everything allowed".
                    if value.is_empty() {
                        continue;
                    }
                    let rule = PathRule { prefix: value.to_string(), allow };
                    if group_specific {
                        specific.rules.push(rule.clone());
                    }
                    if group_wildcard {
                        wildcard.rules.push(rule);
                    }
                }
                "crawl-delay" | "crawldelay" => {
                    targets_open = false;
                    if let Ok(seconds) = value.parse::<f64>()
                        && seconds >= 0.0
                    {
                        let delay_ms = (seconds * 1000.0) as u64;
                        if group_specific {
                            specific.crawl_delay_ms = Some(delay_ms);
                        }
                        if group_wildcard {
                            wildcard.crawl_delay_ms = Some(delay_ms);
                        }
                    }
                }
                _ => {
                    targets_open = false;
                }
            }
        }

        // A group naming this agent takes precedence over the * group.
        let group = if specific.seen() { specific } else { wildcard };
        Self {
            access: if group.rules.is_empty() { Access::All } else { Access::Rules(group.rules) },
            crawl_delay_ms: group.crawl_delay_ms.unwrap_or(default_crawl_delay_ms),
            defer_visits: false,
        }
    }

    /// Derive rules from the HTTP status of a failed robots.txt fetch.
    pub fn from_status(status: u16, default_crawl_delay_ms: u64) -> Self {
        match status {
            401 | 403 => Self::allow_none(default_crawl_delay_ms),
            429 => Self::deferred(default_crawl_delay_ms),
            s if s >= 500 => Self::deferred(default_crawl_delay_ms),
            _ => Self::allow_all(default_crawl_delay_ms),
        }
    }

    /// Derive rules from a failed robots.txt fetch.
    pub fn from_fetch_error(err: &Error, default_crawl_delay_ms: u64) -> Self {
        match err.http_status() {
            Some(status) => Self::from_status(status, default_crawl_delay_ms),
            None => Self::deferred(default_crawl_delay_ms),
        }
    }

    /// Whether this agent may fetch `url`.
    ///
    /// Longest matching prefix wins; on a tie, Allow wins.
    pub fn is_allowed(&self, url: &Url) -> bool {
        let rules = match &self.access {
            Access::All => return true,
            Access::None => return false,
            Access::Rules(rules) => rules,
        };

        let path = url.path();
        let mut best_len = 0usize;
        let mut allowed = true;
        for rule in rules {
            if !path.starts_with(rule.prefix.as_str()) {
                continue;
            }
            let len = rule.prefix.len();
            if len > best_len || (len == best_len && rule.allow) {
                best_len = len;
                allowed = rule.allow;
            }
        }
        allowed
    }

    /// Delay between requests to this host, in milliseconds.
    pub fn crawl_delay_ms(&self) -> u64 {
        self.crawl_delay_ms
    }

    /// True when the caller should defer this host to a later run.
    pub fn defer_visits(&self) -> bool {
        self.defer_visits
    }
}

#[derive(Debug, Default)]
struct GroupRules {
    rules: Vec<PathRule>,
    crawl_delay_ms: Option<u64>,
}

impl GroupRules {
    fn seen(&self) -> bool {
        !self.rules.is_empty() || self.crawl_delay_ms.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_empty_body_allows_all() {
        let rules = RobotsRules::from_content("trawl", b"", 5_000);
        assert!(rules.is_allowed(&url("http://example.com/anything")));
        assert_eq!(rules.crawl_delay_ms(), 5_000);
        assert!(!rules.defer_visits());
    }

    #[test]
    fn test_disallow_all() {
        let body = b"User-agent: *\nDisallow: /\n";
        let rules = RobotsRules::from_content("trawl", body, 1_000);
        assert!(!rules.is_allowed(&url("http://example.com/")));
        assert!(!rules.is_allowed(&url("http://example.com/deep/page")));
    }

    #[test]
    fn test_empty_disallow_allows_all() {
        let body = b"User-agent: *\nDisallow:\n";
        let rules = RobotsRules::from_content("trawl", body, 1_000);
        assert!(rules.is_allowed(&url("http://example.com/any")));
    }

    #[test]
    fn test_longest_prefix_wins() {
        let body = b"User-agent: *\nDisallow: /private\nAllow: /private/public\n";
        let rules = RobotsRules::from_content("trawl", body, 1_000);
        assert!(!rules.is_allowed(&url("http://example.com/private/a")));
        assert!(rules.is_allowed(&url("http://example.com/private/public/a")));
        assert!(rules.is_allowed(&url("http://example.com/open")));
    }

    #[test]
    fn test_allow_wins_tie() {
        let body = b"User-agent: *\nDisallow: /page\nAllow: /page\n";
        let rules = RobotsRules::from_content("trawl", body, 1_000);
        assert!(rules.is_allowed(&url("http://example.com/page")));
    }

    #[test]
    fn test_specific_group_beats_wildcard() {
        let body = b"User-agent: *\nDisallow: /\n\nUser-agent: trawl\nDisallow: /internal\n";
        let rules = RobotsRules::from_content("trawl/0.1", body, 1_000);
        assert!(rules.is_allowed(&url("http://example.com/open")));
        assert!(!rules.is_allowed(&url("http://example.com/internal/x")));
    }

    #[test]
    fn test_shared_group_targets() {
        // Two consecutive User-agent lines share the rules that follow.
        let body = b"User-agent: other\nUser-agent: trawl\nDisallow: /x\n";
        let rules = RobotsRules::from_content("trawl", body, 1_000);
        assert!(!rules.is_allowed(&url("http://example.com/x")));
        assert!(rules.is_allowed(&url("http://example.com/y")));
    }

    #[test]
    fn test_crawl_delay_parsing() {
        let body = b"User-agent: *\nCrawl-delay: 2.5\nDisallow: /x\n";
        let rules = RobotsRules::from_content("trawl", body, 1_000);
        assert_eq!(rules.crawl_delay_ms(), 2_500);
    }

    #[test]
    fn test_crawl_delay_default_when_absent() {
        let body = b"User-agent: *\nDisallow: /x\n";
        let rules = RobotsRules::from_content("trawl", body, 7_000);
        assert_eq!(rules.crawl_delay_ms(), 7_000);
    }

    #[test]
    fn test_comments_and_case() {
        let body = b"# preamble\nUSER-AGENT: * # all bots\nDISALLOW: /a # keep out\n";
        let rules = RobotsRules::from_content("trawl", body, 1_000);
        assert!(!rules.is_allowed(&url("http://example.com/a")));
        assert!(rules.is_allowed(&url("http://example.com/b")));
    }

    #[test]
    fn test_from_status_forbidden() {
        for status in [401u16, 403] {
            let rules = RobotsRules::from_status(status, 1_000);
            assert!(!rules.is_allowed(&url("http://example.com/")));
            assert!(!rules.defer_visits());
        }
    }

    #[test]
    fn test_from_status_deferred() {
        for status in [429u16, 500, 503] {
            let rules = RobotsRules::from_status(status, 1_000);
            assert!(rules.defer_visits());
        }
    }

    #[test]
    fn test_from_status_not_found_allows_all() {
        let rules = RobotsRules::from_status(404, 1_000);
        assert!(rules.is_allowed(&url("http://example.com/any")));
        assert!(!rules.defer_visits());
    }

    #[test]
    fn test_from_fetch_error() {
        let err = Error::HttpStatus { status: 404, url: "http://example.com/robots.txt".into() };
        assert!(!RobotsRules::from_fetch_error(&err, 1_000).defer_visits());

        let err = Error::Network { url: "http://example.com/robots.txt".into(), message: "timeout".into() };
        assert!(RobotsRules::from_fetch_error(&err, 1_000).defer_visits());
    }
}
