//! HTTP transport abstraction.
//!
//! The engine talks to the network through the [`Transport`] trait: a HEAD
//! probe for content length and range capability, and a ranged GET returning
//! a streamable body. The trait seam allows mock transports in tests.

use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by a transport. All three kinds are recoverable and routed
/// to the retry queue by the engine.
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    /// The request exceeded the fixed per-request timeout.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Reading the body or saving the buffered content failed.
    #[error("I/O failure for {url}: {reason}")]
    Io { url: String, reason: String },

    /// Any other failure.
    #[error("request to {url} failed: {reason}")]
    Unclassified { url: String, reason: String },
}

/// Result of a HEAD probe.
#[derive(Debug, Clone, Copy)]
pub struct Probe {
    /// Resource size in bytes, 0 when the server did not report one.
    pub content_length: u64,

    /// Whether the server advertises byte-range support.
    pub range_supported: bool,
}

/// Blocking HTTP operations needed by the download engine.
pub trait Transport {
    /// Probe the resource for content length and range capability.
    fn probe(&self, url: &str) -> Result<Probe, TransportError>;

    /// Issue a GET carrying the given headers (including any `Range`) and
    /// optional body, returning a streamable response body.
    fn fetch(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        data: Option<&str>,
    ) -> Result<Box<dyn Read>, TransportError>;
}

/// Real transport built on `reqwest::blocking`.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Create a transport whose requests all carry the given timeout.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Unclassified {
                url: String::new(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn probe(&self, url: &str) -> Result<Probe, TransportError> {
        let response = self
            .client
            .head(url)
            .send()
            .map_err(|e| classify(url, e))?;

        if !response.status().is_success() {
            return Err(TransportError::Unclassified {
                url: url.to_string(),
                reason: format!("HEAD request failed with status {}", response.status()),
            });
        }

        let content_length = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let range_supported = response
            .headers()
            .get(reqwest::header::ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .map(|v| v != "none")
            .unwrap_or(false);

        Ok(Probe {
            content_length,
            range_supported,
        })
    }

    fn fetch(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        data: Option<&str>,
    ) -> Result<Box<dyn Read>, TransportError> {
        let mut request = self.client.get(url);
        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }
        if let Some(body) = data {
            request = request.body(body.to_string());
        }

        let response = request.send().map_err(|e| classify(url, e))?;

        let status = response.status();
        // 206 = Partial Content, the expected answer to a Range request.
        if !status.is_success() {
            return Err(TransportError::Unclassified {
                url: url.to_string(),
                reason: format!("GET request failed with status {}", status),
            });
        }

        Ok(Box::new(response))
    }
}

fn classify(url: &str, error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_body() || error.is_decode() {
        TransportError::Io {
            url: url.to_string(),
            reason: error.to_string(),
        }
    } else {
        TransportError::Unclassified {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }
}
