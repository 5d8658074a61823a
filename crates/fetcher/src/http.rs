//! HTTP fetch engine.
//!
//! One connection-pooled client shared by every fetch worker. Failures of
//! a content fetch never surface as errors; they are encoded in the
//! returned [`FetchedDatum`]. The lower-level [`HttpFetcher::fetch_bytes`]
//! used for robots.txt acquisition does surface typed failures so the
//! caller can distinguish HTTP status from network trouble.
//!
//! ### Body handling
//! - 200 responses read up to `max_content_size`; anything else keeps a
//!   1 KiB debug window alongside the ERROR outcome.
//! - `Content-Length` is trusted for the truncation decision.
//! - The running read rate is checked after every chunk; a peer slower
//!   than `min_response_rate` with bytes still owed is aborted.
//! - Truncated or aborted bodies drop the connection instead of draining
//!   it, so the socket is not returned to the pool.

use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response, redirect};
use url::Url;

use trawl_core::{Error, FetchStatus, FetchedDatum, FetcherPolicy, Headers, ScoredUrlDatum, now_ms};

/// Body bytes kept for non-200 responses, for debugging.
const DEBUG_CONTENT_WINDOW: u64 = 1024;

/// GET attempts per URL.
const MAX_FETCH_ATTEMPTS: usize = 3;

/// The fetch seam: one request in, one datum out.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch one URL. Never fails; failures are encoded in the datum.
    async fn fetch(&self, scored: &ScoredUrlDatum) -> FetchedDatum;
}

/// Fetches robots.txt bodies for the grouping step.
#[async_trait]
pub trait RobotsFetcher: Send + Sync {
    /// Fetch raw bytes, surfacing HTTP status and network failures.
    async fn get_bytes(&self, url: &Url) -> Result<Bytes, Error>;
}

#[async_trait]
impl<T: RobotsFetcher + ?Sized> RobotsFetcher for std::sync::Arc<T> {
    async fn get_bytes(&self, url: &Url) -> Result<Bytes, Error> {
        (**self).get_bytes(url).await
    }
}

/// Connection-pooled HTTP fetcher.
///
/// Built explicitly at manager startup; dropping it closes the pool.
pub struct HttpFetcher {
    client: Client,
    policy: FetcherPolicy,
}

impl HttpFetcher {
    /// Build the client from the policy.
    ///
    /// Per-route idle connections are capped at `threads_per_host + 1`;
    /// the extra slot covers a concurrent robots.txt fetch.
    pub fn new(policy: FetcherPolicy) -> Result<Self, Error> {
        let client = Client::builder()
            .user_agent(policy.user_agent.value())
            .connect_timeout(policy.request_timeout())
            .read_timeout(policy.request_timeout())
            .redirect(redirect::Policy::limited(policy.max_redirects))
            .pool_max_idle_per_host(policy.threads_per_host + 1)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::ClientBuild(e.to_string()))?;

        Ok(Self { client, policy })
    }

    /// Size of the worker pool this fetcher is provisioned for.
    pub fn max_threads(&self) -> usize {
        self.policy.max_threads
    }

    /// Fetch one URL, streaming the body under the policy caps.
    pub async fn fetch_url(&self, scored: &ScoredUrlDatum) -> FetchedDatum {
        let metadata = scored.datum.metadata.clone();
        let url = match Url::parse(&scored.datum.url) {
            Ok(url) => url,
            Err(e) => {
                return FetchedDatum::failure(&scored.datum.url, format!("invalid URL: {e}"), metadata);
            }
        };

        let started = Instant::now();
        let mut response = match self.send_with_retry(&url).await {
            Ok(response) => response,
            Err(e) => {
                return FetchedDatum::failure(url.as_str(), format!("request failed: {e}"), metadata);
            }
        };

        let status_code = response.status().as_u16();
        let (mut status, target_cap) = if status_code == 200 {
            (FetchStatus::Fetched, self.policy.max_content_size)
        } else {
            (FetchStatus::Error, DEBUG_CONTENT_WINDOW)
        };
        let mut message =
            (status == FetchStatus::Error).then(|| format!("HTTP status {status_code}"));

        let redirected_url = response.url().to_string();
        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            headers.insert(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
        }
        let content_type = headers.get("content-type").map(str::to_string);

        let content_length = response.content_length();
        let mut target = target_cap;
        let mut truncated = false;
        if let Some(len) = content_length {
            if len > target {
                truncated = true;
            } else {
                target = len;
            }
        }

        let mut content: Vec<u8> = Vec::with_capacity(target.min(16 * 1024) as usize);
        let mut read_rate = 0u64;
        loop {
            let chunk = match response.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    // A datum that already records a failure keeps its
                    // status; a read error on a good response degrades it.
                    if status == FetchStatus::Fetched {
                        status = FetchStatus::Error;
                        message = Some(format!("read failed: {e}"));
                    }
                    break;
                }
            };

            let remaining = (target as usize).saturating_sub(content.len());
            let over_target = chunk.len() > remaining;
            if over_target {
                content.extend_from_slice(&chunk[..remaining]);
                truncated = true;
            } else {
                content.extend_from_slice(&chunk);
            }

            let elapsed_ms = (started.elapsed().as_millis().max(1)) as u64;
            read_rate = (content.len() as u64) * 1000 / elapsed_ms;

            if over_target {
                // Bytes remain on the wire; dropping the response below
                // aborts the connection instead of pooling it.
                break;
            }

            let more_expected = content_length.is_none_or(|len| (content.len() as u64) < len);
            if self.policy.min_response_rate > 0
                && read_rate < self.policy.min_response_rate
                && more_expected
            {
                status = FetchStatus::Aborted;
                message = Some(format!(
                    "read rate {read_rate} bytes/sec below minimum {}",
                    self.policy.min_response_rate
                ));
                break;
            }

            if (content.len() as u64) >= target && (truncated || content_length.is_some()) {
                break;
            }
            // No Content-Length: loop once more past the target so a
            // continuing body registers as truncated rather than complete.
        }
        drop(response);

        tracing::debug!(
            url = %url,
            status_code,
            bytes = content.len(),
            read_rate,
            truncated,
            "fetch complete"
        );

        FetchedDatum {
            url: scored.datum.url.clone(),
            redirected_url,
            status,
            status_code,
            headers,
            content,
            content_type,
            truncated,
            read_rate,
            fetched_at: now_ms(),
            message,
            metadata,
        }
    }

    /// Fetch raw bytes with typed failures, for robots.txt acquisition.
    pub async fn fetch_bytes(&self, url: &Url) -> Result<Bytes, Error> {
        let response = self
            .send_with_retry(url)
            .await
            .map_err(|e| Error::Network { url: url.to_string(), message: e.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus { status: status.as_u16(), url: url.to_string() });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network { url: url.to_string(), message: e.to_string() })?;

        let cap = self.policy.max_content_size as usize;
        Ok(if bytes.len() > cap { bytes.slice(..cap) } else { bytes })
    }

    /// Issue a GET with up to [`MAX_FETCH_ATTEMPTS`] attempts.
    ///
    /// GET carries no body, so a dropped connection or timeout is safe to
    /// replay. TLS handshake failures are terminal.
    async fn send_with_retry(&self, url: &Url) -> Result<Response, reqwest::Error> {
        let mut attempt = 1;
        loop {
            match self.client.get(url.clone()).send().await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    if attempt >= MAX_FETCH_ATTEMPTS || !is_retryable(&err) {
                        return Err(err);
                    }
                    tracing::debug!(url = %url, attempt, error = %err, "retrying GET");
                    attempt += 1;
                }
            }
        }
    }
}

fn is_retryable(err: &reqwest::Error) -> bool {
    if err.is_builder() || err.is_redirect() {
        return false;
    }
    let detail = format!("{err:?}").to_ascii_lowercase();
    !(detail.contains("certificate") || detail.contains("handshake") || detail.contains("tls"))
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, scored: &ScoredUrlDatum) -> FetchedDatum {
        self.fetch_url(scored).await
    }
}

#[async_trait]
impl RobotsFetcher for HttpFetcher {
    async fn get_bytes(&self, url: &Url) -> Result<Bytes, Error> {
        self.fetch_bytes(url).await
    }
}
