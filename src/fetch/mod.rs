//! Listing page fetcher
//!
//! This module handles all HTTP requests, including:
//! - Building the HTTP client with a fixed client identity
//! - Per-host pacing shared across concurrent runs
//! - Separating HTTP status results from transport failures

mod client;
mod host_limiter;

pub use client::build_http_client;
pub use host_limiter::{HostLimiter, HostPermit};

use crate::config::FetcherConfig;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Transport-level fetch failures
///
/// An HTTP error status is not a transport failure; it comes back as a
/// [`FetchResponse`] with that status.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Redirect error for {url}: {message}")]
    Redirect { url: String, message: String },

    #[error("Failed to read body from {url}: {message}")]
    Body { url: String, message: String },

    #[error("Request failed for {url}: {message}")]
    Request { url: String, message: String },
}

impl FetchError {
    fn classify(url: &str, error: reqwest::Error) -> Self {
        let url = url.to_string();
        let message = error_chain(&error);

        if error.is_timeout() {
            Self::Timeout { url }
        } else if error.is_connect() {
            Self::Connect { url, message }
        } else if error.is_redirect() {
            Self::Redirect { url, message }
        } else if error.is_body() || error.is_decode() {
            Self::Body { url, message }
        } else {
            Self::Request { url, message }
        }
    }
}

/// Joins an error with its sources, e.g. "error sending request: tcp connect error: Connection refused"
fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// A completed HTTP exchange
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP status code
    pub status_code: u16,
    /// Final URL after redirects
    pub final_url: String,
    /// Response body
    pub body: String,
}

impl FetchResponse {
    /// Statuses of 400 and above fail the run
    pub fn is_error_status(&self) -> bool {
        self.status_code >= 400
    }
}

/// Fetches listing pages; cheap to clone and share across runs
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    limiter: Arc<HostLimiter>,
}

impl Fetcher {
    /// Builds a fetcher with its own client and host registry
    pub fn new(config: &FetcherConfig) -> Result<Self, reqwest::Error> {
        let limiter = HostLimiter::new(Duration::from_millis(config.min_host_interval_ms));
        Ok(Self::with_client(build_http_client(config)?, Arc::new(limiter)))
    }

    pub fn with_client(client: Client, limiter: Arc<HostLimiter>) -> Self {
        Self { client, limiter }
    }

    pub fn limiter(&self) -> &Arc<HostLimiter> {
        &self.limiter
    }

    /// Fetches `url`, returning its status and body
    ///
    /// # Returns
    ///
    /// * `Ok(FetchResponse)` - The server answered, with any status code
    /// * `Err(FetchError)` - DNS, connect, timeout, redirect or body failure
    pub async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let host = parsed.host_str().unwrap_or_default().to_string();

        let _permit = self.limiter.acquire(&host).await;
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| FetchError::classify(url, e))?;

        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::classify(url, e))?;

        tracing::debug!("{} answered {} ({} bytes)", final_url, status_code, body.len());

        Ok(FetchResponse {
            status_code,
            final_url,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(timeout_secs: u64) -> Fetcher {
        Fetcher::new(&FetcherConfig {
            timeout_secs,
            ..FetcherConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_sends_client_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .and(header("user-agent", "DriftwatchTest/1.0"))
            .and(header_exists("accept"))
            .and(header_exists("accept-language"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&FetcherConfig {
            user_agent: "DriftwatchTest/1.0".to_string(),
            ..FetcherConfig::default()
        })
        .unwrap();
        let response = fetcher
            .fetch(&format!("{}/list", server.uri()))
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, "<html>ok</html>");
        assert!(!response.is_error_status());
    }

    #[tokio::test]
    async fn test_error_status_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&server)
            .await;

        let response = fetcher(5)
            .fetch(&format!("{}/gone", server.uri()))
            .await
            .unwrap();

        assert_eq!(response.status_code, 404);
        assert!(response.is_error_status());
    }

    #[tokio::test]
    async fn test_follows_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(301)
                    .insert_header("location", format!("{}/new", server.uri()).as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
            .mount(&server)
            .await;

        let response = fetcher(5)
            .fetch(&format!("{}/old", server.uri()))
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        assert!(response.final_url.ends_with("/new"));
        assert_eq!(response.body, "moved");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then release a port so nothing is listening on it
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let result = fetcher(5)
            .fetch(&format!("http://127.0.0.1:{}/", port))
            .await;

        assert!(matches!(result, Err(FetchError::Connect { .. })));
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let result = fetcher(1).fetch(&server.uri()).await;
        assert!(matches!(result, Err(FetchError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let result = fetcher(1).fetch("not a url").await;
        assert!(matches!(result, Err(FetchError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_registers_host_handle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let fetcher = fetcher(5);
        fetcher.fetch(&server.uri()).await.unwrap();
        fetcher.fetch(&server.uri()).await.unwrap();

        assert_eq!(fetcher.limiter().host_count(), 1);
    }
}
