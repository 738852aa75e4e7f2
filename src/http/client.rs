//! HTTP client with retry and rate limiting
//!
//! Every request goes through the same sequence:
//! 1. acquire a slot from the shared [`RateGovernor`]
//! 2. get a bearer token from the shared [`TokenAuthority`]
//! 3. send, then classify the response
//!
//! A 401 invalidates the token and the request is replayed once with a fresh
//! one. 5xx responses and transport timeouts are retried with backoff up to
//! `max_retries` times.

use super::classify::{classify, ResponseClass};
use super::rate_limit::RateGovernor;
use crate::auth::TokenAuthority;
use crate::error::{Error, Result};
use crate::types::{BackoffType, JsonValue, Method};
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Longest response excerpt carried in error messages
const ERROR_BODY_LIMIT: usize = 512;

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for all requests
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Maximum number of retries
    pub max_retries: u32,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: Duration::from_secs(300),
            max_retries: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            backoff_type: BackoffType::Exponential,
            user_agent: format!("zoho-sprints-tap/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// One API call, already resolved against its context
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Path relative to the base URL (or an absolute URL)
    pub path: String,
    /// Query parameters, in order
    pub query: Vec<(String, String)>,
    /// JSON body for POST requests
    pub body: Option<JsonValue>,
}

impl ApiRequest {
    /// Create a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set JSON body (switches the method to POST)
    #[must_use]
    pub fn json(mut self, body: JsonValue) -> Self {
        self.method = Method::POST;
        self.body = Some(body);
        self
    }
}

/// A validated API response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Parsed JSON body
    pub body: JsonValue,
}

/// HTTP client bound to one API, one governor and one token authority
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    governor: Arc<RateGovernor>,
    authority: Arc<TokenAuthority>,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(
        config: HttpClientConfig,
        governor: Arc<RateGovernor>,
        authority: Arc<TokenAuthority>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            config,
            governor,
            authority,
        })
    }

    /// Get the underlying reqwest client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub fn governor(&self) -> &Arc<RateGovernor> {
        &self.governor
    }

    pub fn authority(&self) -> &Arc<TokenAuthority> {
        &self.authority
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Issue a request and return its validated JSON body
    ///
    /// Suspends on the rate window, the token refresh and the response; each
    /// of those observes `cancel`.
    pub async fn fetch(&self, request: &ApiRequest, cancel: &CancellationToken) -> Result<ApiResponse> {
        let full_url = self.build_url(&request.path);
        let max_retries = self.config.max_retries;
        let mut attempt = 0;
        let mut reauthorized = false;

        loop {
            self.governor.acquire_or_cancel(cancel).await?;
            let token = self.authority.get_token_or_cancel(cancel).await?;

            let mut req = self
                .client
                .request(request.method.into(), &full_url)
                .bearer_auth(&token);
            if !request.query.is_empty() {
                req = req.query(&request.query);
            }
            if let Some(ref body) = request.body {
                req = req.json(body);
            }

            let sent = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                sent = req.send() => sent,
            };

            let response = match sent {
                Ok(response) => response,
                Err(e) => {
                    let err = if e.is_timeout() {
                        Error::Timeout {
                            timeout_ms: self.config.timeout.as_millis() as u64,
                        }
                    } else {
                        Error::Http(e)
                    };
                    if err.is_retryable() && attempt < max_retries {
                        let delay = self.calculate_backoff(attempt);
                        warn!(
                            "Request to {} failed ({err}), attempt {}/{}, retrying in {:?}",
                            request.path,
                            attempt + 1,
                            max_retries + 1,
                            delay
                        );
                        self.sleep_or_cancel(delay, cancel).await?;
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
            };

            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let text = response.text().await?;
            let body: Option<JsonValue> = serde_json::from_str(&text).ok();

            match classify(status, body.as_ref()) {
                ResponseClass::Success => {
                    debug!("Request succeeded: {:?} {} ({status})", request.method, full_url);
                    let body = body.ok_or_else(|| {
                        Error::parse(format!(
                            "Response for path {} is not JSON: {}",
                            request.path,
                            excerpt(&text)
                        ))
                    })?;
                    return Ok(ApiResponse {
                        status,
                        headers,
                        body,
                    });
                }
                ResponseClass::Lockout => {
                    return Err(Error::lockout(format!(
                        "{status} for path {}. Response content: {}",
                        request.path,
                        excerpt(&text)
                    )));
                }
                ResponseClass::Unauthorized if !reauthorized => {
                    self.authority.invalidate(&token).await;
                    reauthorized = true;
                }
                ResponseClass::Unauthorized => {
                    return Err(Error::auth(format!(
                        "Access token rejected twice for path {}: {}",
                        request.path,
                        excerpt(&text)
                    )));
                }
                ResponseClass::ClientError => {
                    return Err(Error::http_status(status, &request.path, excerpt(&text)));
                }
                ResponseClass::ServerError => {
                    let err = Error::http_status(status, &request.path, excerpt(&text));
                    if attempt >= max_retries {
                        return Err(Error::MaxRetriesExceeded {
                            max_retries,
                            last: err.to_string(),
                        });
                    }
                    let delay = self.calculate_backoff(attempt);
                    warn!(
                        "Request failed with {status}, attempt {}/{}, retrying in {:?}",
                        attempt + 1,
                        max_retries + 1,
                        delay
                    );
                    self.sleep_or_cancel(delay, cancel).await?;
                    attempt += 1;
                }
            }
        }
    }

    async fn sleep_or_cancel(&self, delay: Duration, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Build full URL from path
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// Calculate backoff delay for a given attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        self.config.backoff_type.delay(
            self.config.initial_backoff,
            self.config.max_backoff,
            attempt,
        )
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("governor", &self.governor)
            .finish_non_exhaustive()
    }
}

fn excerpt(text: &str) -> String {
    if text.len() <= ERROR_BODY_LIMIT {
        return text.to_string();
    }
    let mut end = ERROR_BODY_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
