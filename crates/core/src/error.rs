//! Unified error types for the fetch stage.

/// Errors surfaced by the fetcher crates.
///
/// The fetch engine itself never returns these for content fetches (it
/// encodes failures in the returned datum); they appear on the typed
/// low-level surfaces: robots acquisition, spill files, and setup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// URL failed to parse, or has no host.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Server answered with a non-success HTTP status.
    #[error("HTTP status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Network-level failure before or during a response.
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    /// Spill file I/O failed.
    #[error("spill I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Spill record could not be encoded or decoded.
    #[error("spill codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl Error {
    /// HTTP status carried by this error, when there is one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::HttpStatus { status: 503, url: "http://example.com/robots.txt".into() };
        assert!(err.to_string().contains("503"));
        assert_eq!(err.http_status(), Some(503));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.http_status(), None);
    }
}
