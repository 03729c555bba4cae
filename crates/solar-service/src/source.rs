//! Where raw samples come from.
//!
//! Scraping the inverter's status page happens outside this service. A
//! scraper either pushes samples to `POST /api/samples` or exposes the
//! latest one as JSON for [`HttpSampleSource`] to poll.

use std::time::Duration;

use async_trait::async_trait;
use solar_types::RawSample;
use tracing::debug;

/// Errors fetching a sample from upstream.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),
    #[error("Request to {url} failed: {source}")]
    Request { url: String, source: reqwest::Error },
    #[error("Upstream {url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("Invalid sample payload from {url}: {source}")]
    Decode { url: String, source: reqwest::Error },
}

/// Supplier of the most recent raw sample.
#[async_trait]
pub trait SampleSource: Send + Sync {
    /// Fetch one sample.
    async fn fetch_sample(&self) -> Result<RawSample, SourceError>;
}

/// Polls a scraper endpoint that returns a [`RawSample`] as JSON.
#[derive(Debug, Clone)]
pub struct HttpSampleSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSampleSource {
    /// Create a source for `url` with a per-request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(SourceError::Client)?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// The endpoint being polled.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SampleSource for HttpSampleSource {
    async fn fetch_sample(&self) -> Result<RawSample, SourceError> {
        debug!("Fetching sample from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SourceError::Request {
                url: self.url.clone(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        response
            .json::<RawSample>()
            .await
            .map_err(|e| SourceError::Decode {
                url: self.url.clone(),
                source: e,
            })
    }
}
