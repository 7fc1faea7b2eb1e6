//! HTTP fetching with a browser user agent, a per-request timeout and a
//! fixed delay between consecutive requests.

use crate::catalog::FetchSettings;
use anyhow::{Context, Result};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("HTTP {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// Sequential HTTP client. Every request waits for the pacing delay.
pub struct HttpFetcher {
    client: reqwest::Client,
    pacer: Pacer,
}

impl HttpFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self> {
        Self::with_delay(settings, settings.delay())
    }

    /// Same as [`HttpFetcher::new`] with an explicit pacing delay
    pub fn with_delay(settings: &FetchSettings, delay: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&settings.user_agent)
            .timeout(settings.timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            pacer: Pacer::new(delay),
        })
    }

    /// Fetch a page body as text
    pub async fn fetch_text(&mut self, url: &str) -> Result<String, FetchError> {
        let response = self.get(url).await?;
        Ok(response.text().await?)
    }

    /// Fetch raw bytes (images)
    pub async fn fetch_bytes(&mut self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.get(url).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn get(&mut self, url: &str) -> Result<reqwest::Response, FetchError> {
        self.pacer.wait().await;
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response)
    }
}

/// Fixed pause before every request except the first, however long the
/// previous one took
pub struct Pacer {
    delay: Duration,
    started: bool,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: false,
        }
    }

    pub async fn wait(&mut self) {
        if self.started {
            tokio::time::sleep(self.delay).await;
        }
        self.started = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn test_fetch_error_display() {
        assert_eq!(FetchError::Timeout.to_string(), "request timed out");
        assert_eq!(FetchError::Status(404).to_string(), "HTTP 404");
        assert_eq!(
            FetchError::Network("connection refused".to_string()).to_string(),
            "network error: connection refused"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacer_spaces_requests() {
        let mut pacer = Pacer::new(Duration::from_secs(2));
        let start = Instant::now();

        pacer.wait().await;
        assert!(start.elapsed() < Duration::from_millis(1));

        pacer.wait().await;
        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacer_waits_after_slow_request() {
        let mut pacer = Pacer::new(Duration::from_secs(2));
        pacer.wait().await;

        // request that outlasts the delay
        tokio::time::advance(Duration::from_secs(20)).await;

        let before = Instant::now();
        pacer.wait().await;
        assert!(before.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_pacer_zero_delay() {
        let mut pacer = Pacer::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..5 {
            pacer.wait().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
