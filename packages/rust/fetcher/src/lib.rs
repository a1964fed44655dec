//! Subscription source retrieval.
//!
//! The pipeline only needs "give me the raw payload for this source", so the
//! seam is the [`SourceFetcher`] trait. [`HttpFetcher`] is the production
//! implementation: one GET per source, bounded by a timeout, no retries.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use submerge_shared::{Result, SubmergeError};
use tracing::{debug, instrument};

/// Maximum number of redirects to follow per source.
const MAX_REDIRECTS: usize = 5;

/// Default timeout in seconds for one source request.
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Maximum payload size we accept (10 MB).
const MAX_RESPONSE_SIZE: u64 = 10 * 1024 * 1024;

/// Some providers refuse obviously non-browser clients.
const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 submerge/",
    env!("CARGO_PKG_VERSION")
);

// ---------------------------------------------------------------------------
// SourceFetcher
// ---------------------------------------------------------------------------

/// Retrieves the raw payload of one subscription source.
///
/// Any failure is reported as an error; the caller decides that a failed
/// source simply contributes nothing.
pub trait SourceFetcher: Send + Sync {
    fn fetch(&self, source: &str) -> impl Future<Output = Result<String>> + Send;
}

// ---------------------------------------------------------------------------
// HttpFetcher
// ---------------------------------------------------------------------------

/// Configuration for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Whole-request timeout (connect + body).
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// HTTP(S) fetcher backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher with the given options.
    pub fn new(opts: &FetchOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(opts.timeout)
            .build()
            .map_err(|e| SubmergeError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

impl SourceFetcher for HttpFetcher {
    #[instrument(skip_all, fields(source = %source))]
    async fn fetch(&self, source: &str) -> Result<String> {
        let response = self
            .client
            .get(source)
            .send()
            .await
            .map_err(|e| SubmergeError::Network(format!("{source}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubmergeError::Network(format!("{source}: HTTP {status}")));
        }

        // Check content-length if available
        if let Some(len) = response.content_length() {
            if len > MAX_RESPONSE_SIZE {
                return Err(SubmergeError::Network(format!(
                    "{source}: response too large ({len} bytes, max {MAX_RESPONSE_SIZE})"
                )));
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| SubmergeError::Network(format!("{source}: failed to read body: {e}")))?;

        debug!(bytes = body.len(), "source fetched");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher(timeout: Duration) -> HttpFetcher {
        HttpFetcher::new(&FetchOptions { timeout }).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/sub"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string("trojan://pass@1.2.3.4:443#a\n"),
            )
            .mount(&server)
            .await;

        let body = fetcher(Duration::from_secs(5))
            .fetch(&format!("{}/sub", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "trojan://pass@1.2.3.4:443#a\n");
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::path("/gone"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetcher(Duration::from_secs(5))
            .fetch(&format!("{}/gone", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmergeError::Network(_)));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::path("/slow"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string("ss://x")
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let err = fetcher(Duration::from_millis(200))
            .fetch(&format!("{}/slow", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmergeError::Network(_)));
    }

    #[tokio::test]
    async fn test_fetch_oversized_body_is_network_error() {
        let server = wiremock::MockServer::start().await;
        let body = "a".repeat(MAX_RESPONSE_SIZE as usize + 1);

        wiremock::Mock::given(wiremock::matchers::path("/huge"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let err = fetcher(Duration::from_secs(10))
            .fetch(&format!("{}/huge", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmergeError::Network(_)));
        assert!(err.to_string().contains("too large"));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host() {
        // Port 9 (discard) on loopback is virtually never listening.
        let err = fetcher(Duration::from_secs(2))
            .fetch("http://127.0.0.1:9/sub")
            .await
            .unwrap_err();
        assert!(matches!(err, SubmergeError::Network(_)));
    }
}
