//! HTTP client wrapper for the archive session.
//!
//! [`Fetcher`] owns the authenticated session (a reqwest client backed by a
//! cookie jar) and is the only type in the crate that touches the network.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use reqwest::cookie::Jar;
use tracing::{debug, instrument, warn};
use url::Url;

use super::error::FetchError;
use super::retry::{RetryDecision, RetryPolicy, classify_error};
use super::stats::FetchStats;
use crate::user_agent;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (2 minutes; page PDFs are a few MB).
pub const READ_TIMEOUT_SECS: u64 = 120;

/// HTTP verb for a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// Plain GET.
    Get,
    /// POST with the parameters in the query string.
    Post,
}

/// Connect and read timeouts for the session client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTimeouts {
    /// Connect timeout.
    pub connect: Duration,
    /// Whole-request timeout.
    pub read: Duration,
}

impl Default for FetchTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read: Duration::from_secs(READ_TIMEOUT_SECS),
        }
    }
}

/// Retrying fetcher over one authenticated session.
///
/// Created once per run and reused for every request so the session cookies
/// set during login travel with all later requests.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use newsbinder_core::fetch::{FetchStats, FetchTimeouts, Fetcher, HttpMethod, RetryPolicy};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let stats = Arc::new(FetchStats::new());
/// let fetcher = Fetcher::new(FetchTimeouts::default(), RetryPolicy::default(), stats)?;
/// let body = fetcher
///     .fetch_text("https://archive.example/document/1", HttpMethod::Get, &[])
///     .await?;
/// println!("{} bytes", body.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
    stats: Arc<FetchStats>,
}

impl Fetcher {
    /// Creates a fetcher with a fresh cookie jar.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] when the HTTP client cannot be built.
    pub fn new(
        timeouts: FetchTimeouts,
        policy: RetryPolicy,
        stats: Arc<FetchStats>,
    ) -> Result<Self, FetchError> {
        Self::with_cookie_jar(Arc::new(Jar::default()), timeouts, policy, stats)
    }

    /// Creates a fetcher over an existing cookie jar.
    ///
    /// Cookies in the jar are attached to matching requests and cookies set by
    /// responses are stored back into it.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] when the HTTP client cannot be built.
    #[instrument(level = "debug", skip(cookie_jar, stats))]
    pub fn with_cookie_jar(
        cookie_jar: Arc<Jar>,
        timeouts: FetchTimeouts,
        policy: RetryPolicy,
        stats: Arc<FetchStats>,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .cookie_provider(cookie_jar)
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.read)
            .user_agent(user_agent::default_user_agent())
            .gzip(true)
            .build()
            .map_err(|source| FetchError::ClientBuild { source })?;
        Ok(Self {
            client,
            policy,
            stats,
        })
    }

    /// Returns the default retry policy of this fetcher.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the shared counters.
    #[must_use]
    pub fn stats(&self) -> &Arc<FetchStats> {
        &self.stats
    }

    /// Fetches the raw response body using the default retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] once the retry budget is exhausted for
    /// connectivity failures, or immediately for permanent failures.
    pub async fn fetch(
        &self,
        url: &str,
        method: HttpMethod,
        params: &[(&str, &str)],
    ) -> Result<Vec<u8>, FetchError> {
        self.fetch_with(url, method, params, &self.policy).await
    }

    /// Fetches the response body as text using the default retry policy.
    ///
    /// # Errors
    ///
    /// Same as [`fetch`](Self::fetch).
    pub async fn fetch_text(
        &self,
        url: &str,
        method: HttpMethod,
        params: &[(&str, &str)],
    ) -> Result<String, FetchError> {
        let body = self.fetch(url, method, params).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Fetches the response body as text under an explicit retry policy.
    ///
    /// # Errors
    ///
    /// Same as [`fetch`](Self::fetch).
    pub async fn fetch_text_with(
        &self,
        url: &str,
        method: HttpMethod,
        params: &[(&str, &str)],
        policy: &RetryPolicy,
    ) -> Result<String, FetchError> {
        let body = self.fetch_with(url, method, params, policy).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Fetches the raw response body under an explicit retry policy.
    ///
    /// # Errors
    ///
    /// Same as [`fetch`](Self::fetch).
    #[instrument(skip_all, fields(url = %url, method = ?method))]
    pub async fn fetch_with(
        &self,
        url: &str,
        method: HttpMethod,
        params: &[(&str, &str)],
        policy: &RetryPolicy,
    ) -> Result<Vec<u8>, FetchError> {
        let target = build_url(url, params)?;
        self.stats.record_fetch();

        let mut attempt = 1;
        loop {
            let error = match self.send_once(method, &target).await {
                Ok(body) => return Ok(body),
                Err(error) => error,
            };

            match policy.should_retry(classify_error(&error), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    warn!(attempt, error = %error, "fetch failed, retrying");
                    self.stats.record_retry();
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    if error.is_network() {
                        warn!(attempts = attempt, error = %error, "network failure, giving up");
                    } else {
                        debug!(%reason, error = %error, "not retrying");
                    }
                    return Err(error);
                }
            }
        }
    }

    async fn send_once(&self, method: HttpMethod, url: &Url) -> Result<Vec<u8>, FetchError> {
        let request = match method {
            HttpMethod::Get => self.client.get(url.clone()),
            HttpMethod::Post => self.client.post(url.clone()),
        };

        let response = request.send().await.map_err(|e| map_transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url.as_str(), status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| map_transport(url, e))?;
        debug!(bytes = body.len(), "fetched");
        Ok(body.to_vec())
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

fn map_transport(url: &Url, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::timeout(url.as_str())
    } else {
        FetchError::network(url.as_str(), error)
    }
}

/// Parses `url` and appends `params` to its query string.
fn build_url(url: &str, params: &[(&str, &str)]) -> Result<Url, FetchError> {
    let mut parsed = Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;
    if !params.is_empty() {
        parsed.query_pairs_mut().extend_pairs(params.iter().copied());
    }
    Ok(parsed)
}
