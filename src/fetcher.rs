//! HTTP fetcher with bounded retries and exponential backoff.
//!
//! # Retry Strategy
//!
//! - HTTP 408, 429 and 5xx → retry
//! - Other non-2xx → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: `base_delay * 2^(attempt-1)` between attempts (2s, 4s with the
//!   defaults), at most `max_attempts` requests in total

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{FetchConfig, ManifestConfig};
use crate::traits::Fetch;

/// How many times and how patiently to retry one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Policy for document downloads.
    pub fn for_documents(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
            timeout: config.timeout(),
        }
    }

    /// Policy for the catalog manifest: short timeout, few retries.
    pub fn for_manifest(fetch: &FetchConfig, manifest: &ManifestConfig) -> Self {
        Self {
            max_attempts: manifest.max_retries.saturating_add(1),
            base_delay: fetch.base_delay(),
            timeout: Duration::from_secs(manifest.timeout_secs),
        }
    }

    /// Delay before `attempt` (0-based). The first attempt never waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        self.base_delay * (1u32 << (attempt - 1).min(10))
    }
}

/// Fetches documents over HTTP(S) with a [`RetryPolicy`].
pub struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(policy: RetryPolicy, user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(policy.timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client, policy })
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let mut last_err = None;

        for attempt in 0..self.policy.max_attempts {
            let delay = self.policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.fetch_once(url).await {
                Ok(body) => {
                    debug!(url, attempt, "fetched");
                    return Ok(body);
                }
                Err(e) if e.is_retryable() => {
                    debug!(url, attempt, error = %e, "retryable fetch failure");
                    last_err = Some(e);
                }
                Err(e) => {
                    warn!(url, error = %e, "fetch failed");
                    return Err(e);
                }
            }
        }

        let err = last_err.unwrap_or(FetchError::Exhausted);
        warn!(url, attempts = self.policy.max_attempts, error = %err, "giving up");
        Err(err)
    }
}

/// Errors from a single remote read.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    HttpStatus(u16),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("retries exhausted")]
    Exhausted,
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::HttpStatus(code) => {
                let status = StatusCode::from_u16(*code).unwrap_or(StatusCode::BAD_GATEWAY);
                status.is_server_error()
                    || status == StatusCode::TOO_MANY_REQUESTS
                    || status == StatusCode::REQUEST_TIMEOUT
            }
            FetchError::Request(e) => !e.is_builder(),
            FetchError::InvalidUrl(_) | FetchError::Exhausted => false,
        }
    }
}

/// Resolve a document URL: absolute URLs pass through, relative ones join
/// `base`.
pub fn resolve_url(base: &str, url: &str) -> Result<String, FetchError> {
    if let Ok(abs) = reqwest::Url::parse(url) {
        return Ok(abs.to_string());
    }
    let base = reqwest::Url::parse(base).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
    base.join(url)
        .map(|u| u.to_string())
        .map_err(|e| FetchError::InvalidUrl(e.to_string()))
}
