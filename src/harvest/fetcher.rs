//! HTTP fetcher implementation
//!
//! This module handles every request the harvester makes, including:
//! - Building the HTTP client with the fixed browser-like header set
//! - Enforcing a hard per-attempt timeout
//! - Classifying failures into retryable and terminal kinds
//! - Jittered, linearly backed-off retries

use crate::config::{Config, HarvestConfig, HttpConfig};
use crate::{ConfigError, HarvestError};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{redirect::Policy, Client};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Redirect hops followed before a request counts as a network failure
const MAX_REDIRECTS: usize = 10;

/// Classified cause of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Non-2xx status
    Http(u16),
    /// Connection, DNS, TLS, body read, or redirect failure
    Network,
    /// No complete response within the per-attempt timeout
    Timeout,
    /// 2xx response whose body is not JSON
    Parse,
}

impl ErrorKind {
    /// Returns true if another attempt may succeed
    ///
    /// | Kind | Retry |
    /// |------|-------|
    /// | HTTP 5xx | yes |
    /// | HTTP 429 | yes |
    /// | HTTP 403 | yes, although it usually means a durable block |
    /// | Other HTTP | no |
    /// | Network, Timeout, Parse | yes |
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(status) => *status >= 500 || *status == 429 || *status == 403,
            Self::Network | Self::Timeout | Self::Parse => true,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(status) => write!(f, "HTTP_{}", status),
            Self::Network => write!(f, "NETWORK_ERROR"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::Parse => write!(f, "PARSE_ERROR"),
        }
    }
}

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// A 2xx response with a JSON body
    Success {
        /// Parsed response body
        payload: Value,
        /// Attempts made, including the successful one
        attempts: u32,
    },

    /// The last classified failure after retries stopped
    Failure {
        kind: ErrorKind,
        url: String,
        /// Diagnostic text for logs
        detail: String,
        attempts: u32,
    },
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } | Self::Failure { attempts, .. } => *attempts,
        }
    }
}

/// Timing and retry budget for a single logical fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Hard limit on each attempt
    pub timeout: Duration,
    /// Linear backoff unit
    pub backoff_base: Duration,
    /// Lower bound of the pre-request jitter
    pub jitter_min: Duration,
    /// Upper bound of the pre-request jitter
    pub jitter_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&HarvestConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            max_retries: config.retries,
            timeout: config.timeout(),
            backoff_base: config.backoff_base(),
            jitter_min: Duration::from_millis(config.jitter_min_ms),
            jitter_max: Duration::from_millis(config.jitter_max_ms),
        }
    }

    /// Delay after failed attempt `attempt` (0-based): `base * (attempt + 1)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(attempt.saturating_add(1))
    }

    /// Random pause drawn uniformly from the jitter range
    pub fn jitter(&self) -> Duration {
        jitter_delay(self.jitter_min, self.jitter_max)
    }

    /// Upper bound on attempts for one URL
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Draws a delay uniformly from `[min, max]`
pub fn jitter_delay(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let millis = rand::rng().random_range(min.as_millis() as u64..=max.as_millis() as u64);
    Duration::from_millis(millis)
}

/// Builds an HTTP client sending the configured header set
///
/// Redirects are followed (up to 10 hops); compressed bodies are decoded.
///
/// # Example
///
/// ```no_run
/// use sumi_harvest::config::HttpConfig;
/// use sumi_harvest::harvest::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, HarvestError> {
    let mut headers = HeaderMap::new();
    for (name, value) in config.header_pairs() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ConfigError::InvalidHeader(format!("'{}': {}", name, e)))?;
        let value = HeaderValue::from_str(&value)
            .map_err(|e| ConfigError::InvalidHeader(format!("value of '{}': {}", name, e)))?;
        headers.insert(name, value);
    }

    let client = Client::builder()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

/// A failed attempt before the retry decision
#[derive(Debug)]
struct AttemptError {
    kind: ErrorKind,
    detail: String,
}

impl AttemptError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            ErrorKind::Timeout
        } else {
            ErrorKind::Network
        };
        Self {
            kind,
            detail: e.to_string(),
        }
    }
}

/// Performs logical fetches: one URL, several attempts, one result
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Builds a fetcher from the `[http]` and `[harvest]` sections
    pub fn from_config(config: &Config) -> Result<Self, HarvestError> {
        let client = build_http_client(&config.http)?;
        Ok(Self::new(client, RetryPolicy::from_config(&config.harvest)))
    }

    /// Fetches `url` as JSON, retrying transient failures
    ///
    /// # Request Flow
    ///
    /// 1. Sleep a random jitter
    /// 2. Send GET with the fixed headers, bounded by the attempt timeout
    /// 3. Classify the outcome (see [`ErrorKind::is_retryable`])
    /// 4. On a retryable failure with attempts left, sleep `base * (attempt + 1)`
    ///    and go back to 1
    ///
    /// At most `1 + max_retries` requests are sent. A non-retryable status
    /// returns after one attempt. Failures are returned, never raised.
    pub async fn fetch(&self, url: &str) -> FetchResult {
        let mut attempt: u32 = 0;

        loop {
            tokio::time::sleep(self.policy.jitter()).await;

            let error = match self.attempt(url).await {
                Ok(payload) => {
                    return FetchResult::Success {
                        payload,
                        attempts: attempt + 1,
                    }
                }
                Err(error) => error,
            };

            if !error.kind.is_retryable() || attempt >= self.policy.max_retries {
                return FetchResult::Failure {
                    kind: error.kind,
                    url: url.to_string(),
                    detail: error.detail,
                    attempts: attempt + 1,
                };
            }

            let delay = self.policy.backoff_delay(attempt);
            tracing::debug!(
                "Attempt {}/{} for {} failed with {} ({}), retrying in {:?}",
                attempt + 1,
                self.policy.max_attempts(),
                url,
                error.kind,
                error.detail,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// One request bounded by the timeout
    ///
    /// When the timeout fires the request future is dropped here, which
    /// aborts the in-flight request before this function returns.
    async fn attempt(&self, url: &str) -> Result<Value, AttemptError> {
        match tokio::time::timeout(self.policy.timeout, self.request(url)).await {
            Ok(result) => result,
            Err(_) => Err(AttemptError {
                kind: ErrorKind::Timeout,
                detail: format!("no response within {:?}", self.policy.timeout),
            }),
        }
    }

    async fn request(&self, url: &str) -> Result<Value, AttemptError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(AttemptError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError {
                kind: ErrorKind::Http(status.as_u16()),
                detail: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(AttemptError::from_reqwest)?;

        serde_json::from_slice(&body).map_err(|e| AttemptError {
            kind: ErrorKind::Parse,
            detail: e.to_string(),
        })
    }
}
