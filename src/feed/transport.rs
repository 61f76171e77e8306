use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const FEED_ACCEPT: &str =
    "application/rss+xml, application/atom+xml, application/xml;q=0.9, */*;q=0.8";

/// Public CORS proxy that returns the upstream body verbatim.
pub const DEFAULT_PROXY: &str = "https://api.allorigins.win/raw?url=";

/// Errors that can occur while retrieving feed text.
///
/// The pipeline treats every variant the same way (the feed is reported as
/// failed); the distinction exists for logs.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// The proxied request URL could not be built
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

impl TransportError {
    /// HTTP-like status of the failure, where there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::HttpStatus(code) => Some(*code),
            TransportError::Network(e) => e.status().map(|s| s.as_u16()),
            TransportError::Timeout
            | TransportError::ResponseTooLarge
            | TransportError::InvalidUrl(_) => None,
        }
    }
}

/// Retrieves the raw text of a feed.
///
/// This is the only suspension point of a refresh cycle. Implementations own
/// timeouts and retries; callers only see success or a [`TransportError`].
pub trait Transport {
    fn fetch_text(&self, url: &str) -> impl Future<Output = Result<String, TransportError>> + Send;
}

/// Fetches feeds over HTTP, optionally through a URL-prefix proxy such as
/// AllOrigins (`<proxy><percent-encoded feed url>`).
///
/// 429 and 5xx responses are retried with exponential backoff; other
/// non-success statuses fail immediately.
#[derive(Debug, Clone)]
pub struct ProxyTransport {
    client: reqwest::Client,
    proxy: Option<String>,
    timeout: Duration,
    max_retries: u32,
    backoff_base: Duration,
}

impl ProxyTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            proxy: Some(DEFAULT_PROXY.to_owned()),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
        }
    }

    /// Sets the proxy prefix; `None` or an empty string fetches directly.
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, backoff_base: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff_base = backoff_base;
        self
    }

    /// The URL actually requested for `feed_url`.
    pub fn request_url(&self, feed_url: &str) -> String {
        match &self.proxy {
            Some(prefix) => {
                let encoded: String =
                    url::form_urlencoded::byte_serialize(feed_url.as_bytes()).collect();
                format!("{prefix}{encoded}")
            }
            None => feed_url.to_owned(),
        }
    }

    /// Delay before retry number `retry` (0-based), capped at [`MAX_BACKOFF`].
    fn backoff_delay(&self, retry: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(retry))
            .min(MAX_BACKOFF)
    }

    async fn fetch(&self, feed_url: &str) -> Result<String, TransportError> {
        let request_url = self.request_url(feed_url);
        reqwest::Url::parse(&request_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{request_url}: {e}")))?;

        let mut retry_count = 0;

        loop {
            // The deadline covers the body as well as the headers.
            let outcome = tokio::time::timeout(self.timeout, self.attempt(&request_url))
                .await
                .map_err(|_| TransportError::Timeout)??;

            let status = match outcome {
                Attempt::Body(text) => return Ok(text),
                Attempt::Status(status) => status,
            };

            let retryable =
                status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error();

            if retryable && retry_count < self.max_retries {
                let delay = self.backoff_delay(retry_count);
                tracing::warn!(
                    feed = %feed_url,
                    status = %status,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Retryable response, backing off"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            return Err(TransportError::HttpStatus(status.as_u16()));
        }
    }

    /// One request: the decoded body on success, else the status.
    async fn attempt(&self, request_url: &str) -> Result<Attempt, TransportError> {
        let response = self
            .client
            .get(request_url)
            .header(reqwest::header::ACCEPT, FEED_ACCEPT)
            .send()
            .await
            .map_err(TransportError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Ok(Attempt::Status(status));
        }

        let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;
        Ok(Attempt::Body(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

enum Attempt {
    Body(String),
    Status(reqwest::StatusCode),
}

impl Transport for ProxyTransport {
    async fn fetch_text(&self, url: &str) -> Result<String, TransportError> {
        self.fetch(url).await
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, TransportError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(TransportError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(TransportError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(TransportError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
