//! HTTP download with retry.

use crate::{ArbError, Result};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

/// Something that can fetch the body behind a URL.
pub trait Fetch: Send + Sync {
    /// Download `url` and return the response body.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Blocking HTTP client with exponential backoff.
///
/// Connection failures, timeouts, `429` and `5xx` responses are retried;
/// any other non-success status fails immediately.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    max_retries: u32,
    base_delay: Duration,
}

impl HttpFetcher {
    /// Create a fetcher with a 30 second timeout and 3 retries.
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("arb-spreads/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ArbError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Override the number of retries after the first attempt.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn should_retry(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                warn!(url, attempt, ?delay, "retrying download");
                std::thread::sleep(delay);
            }

            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let body = resp
                            .bytes()
                            .map_err(|e| ArbError::Http(format!("reading body of {url}: {e}")))?;
                        debug!(url, bytes = body.len(), "downloaded");
                        return Ok(body.to_vec());
                    }
                    if !Self::should_retry(status) {
                        return Err(ArbError::Http(format!("HTTP {status} for {url}")));
                    }
                    last_error = Some(ArbError::Http(format!("HTTP {status} for {url}")));
                }
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(ArbError::Http(format!("{url}: {e}")));
                }
                Err(e) => return Err(ArbError::Http(format!("{url}: {e}"))),
            }
        }

        Err(last_error.unwrap_or_else(|| ArbError::Http(format!("{url}: max retries exceeded"))))
    }
}
