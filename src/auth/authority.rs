//! Token authority implementation
//!
//! Caches the access token and performs single-flight refreshes.

use super::types::{CachedToken, OAuthCredentials, RefreshRetry, TokenResponse};
use crate::error::{Error, Result};
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Owner of the run's bearer token
///
/// The cache sits behind an async mutex that is held for the whole refresh
/// request. A caller that finds the token absent or expired either performs
/// the refresh itself or waits for the caller already doing it, then reuses
/// the fresh token. At most one refresh request is ever in flight.
pub struct TokenAuthority {
    /// Refresh grant credentials
    credentials: OAuthCredentials,
    /// Cached token
    cached_token: Mutex<Option<CachedToken>>,
    /// HTTP client for token requests
    http_client: Client,
    /// Budget for transient refresh failures
    retry: RefreshRetry,
    /// Number of refresh grants issued
    refreshes: AtomicU64,
}

impl TokenAuthority {
    /// Create a new authority with the given credentials
    pub fn new(credentials: OAuthCredentials) -> Self {
        Self::with_client(credentials, Client::new())
    }

    /// Create an authority with a custom HTTP client
    pub fn with_client(credentials: OAuthCredentials, http_client: Client) -> Self {
        Self {
            credentials,
            cached_token: Mutex::new(None),
            http_client,
            retry: RefreshRetry::default(),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Replace the retry budget for transient refresh failures
    #[must_use]
    pub fn with_retry(mut self, retry: RefreshRetry) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry(&self) -> &RefreshRetry {
        &self.retry
    }

    /// Get a valid bearer token, refreshing if necessary
    pub async fn get_token(&self) -> Result<String> {
        let mut cached = self.cached_token.lock().await;

        if let Some(token) = cached.as_ref() {
            if !token.is_expired() {
                return Ok(token.token.clone());
            }
            debug!("Cached access token expired, refreshing");
        }

        let new_token = self.fetch_new_token().await?;
        let token_str = new_token.token.clone();
        *cached = Some(new_token);

        Ok(token_str)
    }

    /// Get a valid token, giving up when the run is cancelled
    pub async fn get_token_or_cancel(&self, cancel: &CancellationToken) -> Result<String> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            token = self.get_token() => token,
        }
    }

    /// Drop the cached token after the API rejected it
    ///
    /// Only clears the cache if it still holds `rejected`; if another branch
    /// already replaced it, the newer token is kept and no extra refresh happens.
    pub async fn invalidate(&self, rejected: &str) {
        let mut cached = self.cached_token.lock().await;
        if cached.as_ref().is_some_and(|t| t.token == rejected) {
            warn!("Access token rejected by the API, forcing refresh");
            *cached = None;
        }
    }

    /// Number of token refreshes performed so far (retries not counted)
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Clear the cached token (forces a refresh on next use)
    pub async fn clear_cache(&self) {
        let mut cached = self.cached_token.lock().await;
        *cached = None;
    }

    /// Get the credentials
    pub fn credentials(&self) -> &OAuthCredentials {
        &self.credentials
    }

    /// Perform the refresh-token grant, retrying transient failures
    ///
    /// Runs while the cache lock is held, so waiting callers see either the
    /// fresh token or the final error.
    async fn fetch_new_token(&self) -> Result<CachedToken> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        info!(token_url = %self.credentials.token_url, "Refreshing OAuth access token");

        let mut attempt = 0;
        loop {
            match self.request_token().await {
                Ok(token) => return Ok(token),
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Transient(reason)) if attempt < self.retry.max_retries => {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        "Token refresh failed ({reason}), attempt {}/{}, retrying in {:?}",
                        attempt + 1,
                        self.retry.max_retries + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(Attempt::Transient(reason)) => {
                    return Err(Error::TokenRefresh {
                        message: format!("{reason} (gave up after {} attempts)", attempt + 1),
                    });
                }
            }
        }
    }

    /// One refresh request
    async fn request_token(&self) -> std::result::Result<CachedToken, Attempt> {
        let response = self
            .http_client
            .post(&self.credentials.token_url)
            .form(&self.credentials.grant_form())
            .send()
            .await
            .map_err(|e| {
                let reason = format!("Refresh request failed: {e}");
                if e.is_timeout() || e.is_connect() {
                    Attempt::Transient(reason)
                } else {
                    Attempt::Fatal(Error::TokenRefresh { message: reason })
                }
            })?;

        let status = response.status();
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(Attempt::Transient(format!(
                "Refresh endpoint answered {}: {body}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Attempt::Fatal(Error::TokenRefresh {
                message: format!(
                    "Refresh token request failed with status {}: {body}",
                    status.as_u16()
                ),
            }));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Attempt::Transient(format!("Failed to read refresh response: {e}")))?;
        let token_response: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            Attempt::Fatal(Error::auth(format!("Malformed refresh response: {e}")))
        })?;

        if let Some(error) = token_response.error {
            return Err(Attempt::Fatal(Error::TokenRefresh {
                message: format!("Refresh token rejected: {error}"),
            }));
        }

        let access_token = token_response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Attempt::Fatal(Error::auth("Refresh response has no access_token")))?;

        Ok(match token_response.expires_in {
            Some(secs) => CachedToken::expires_in(access_token, secs),
            None => CachedToken::new(access_token, None),
        })
    }
}

/// Outcome of a failed refresh request
enum Attempt {
    /// Worth retrying: 5xx, timeout, connect failure
    Transient(String),
    /// Rejected grant or malformed answer
    Fatal(Error),
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("credentials", &self.credentials)
            .field("refreshes", &self.refresh_count())
            .finish_non_exhaustive()
    }
}
