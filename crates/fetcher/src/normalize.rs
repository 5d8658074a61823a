//! URL canonicalization for grouping and fetching.

use url::Url;

use trawl_core::Error;

/// Canonicalize a URL string before grouping.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to http:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact
///
/// Only http and https survive; anything else is rejected so it surfaces
/// as a fetch error on the status stream.
pub fn canonicalize(input: &str) -> Result<Url, Error> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(Error::InvalidUrl("empty URL".into()));
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("http://{trimmed}") };

    let mut parsed = Url::parse(&url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(Error::InvalidUrl(format!("unsupported scheme: {scheme}"))),
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| Error::InvalidUrl(format!("no host in {trimmed}")))?
        .to_lowercase();
    parsed
        .set_host(Some(&host))
        .map_err(|e| Error::InvalidUrl(e.to_string()))?;

    parsed.set_fragment(None);

    Ok(parsed)
}

/// The robots.txt location for a URL's authority: `<scheme>://<host>:<port>/robots.txt`.
pub fn robots_url(url: &Url) -> Url {
    let mut robots = url.clone();
    robots.set_path("/robots.txt");
    robots.set_query(None);
    robots.set_fragment(None);
    robots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_basic() {
        let url = canonicalize("http://example.com/page").unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.host_str(), Some("example.com"));
        assert_eq!(url.path(), "/page");
    }

    #[test]
    fn test_canonicalize_default_scheme_is_http() {
        let url = canonicalize("example.com/index.html").unwrap();
        assert_eq!(url.scheme(), "http");
    }

    #[test]
    fn test_canonicalize_lowercases_host() {
        let url = canonicalize("http://EXAMPLE.Com/Path").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
        assert_eq!(url.path(), "/Path");
    }

    #[test]
    fn test_canonicalize_strips_fragment_keeps_query() {
        let url = canonicalize("http://example.com/a?b=1#frag").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query(), Some("b=1"));
    }

    #[test]
    fn test_canonicalize_rejects_other_schemes() {
        assert!(matches!(canonicalize("ftp://example.com/"), Err(Error::InvalidUrl(_))));
        assert!(matches!(canonicalize("file:///etc/passwd"), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_canonicalize_rejects_empty() {
        assert!(matches!(canonicalize("   "), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_robots_url() {
        let url = canonicalize("http://example.com:8080/deep/page?x=1").unwrap();
        assert_eq!(robots_url(&url).as_str(), "http://example.com:8080/robots.txt");
    }

    #[test]
    fn test_robots_url_default_port() {
        let url = canonicalize("http://example.com/page").unwrap();
        assert_eq!(robots_url(&url).as_str(), "http://example.com/robots.txt");
    }
}
