//! Auth configuration types

use chrono::{DateTime, Utc};
use serde::Deserialize;
use crate::types::BackoffType;
use std::fmt;
use std::time::Duration;

/// Redirect URI sent with every refresh grant; the endpoint requires one
/// even though no redirect happens.
pub const REDIRECT_URI: &str = "http://localhost";

/// Credentials for the OAuth2 refresh-token grant
#[derive(Clone)]
pub struct OAuthCredentials {
    /// Token endpoint URL
    pub token_url: String,
    /// Client ID
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
    /// Long-lived refresh token
    pub refresh_token: String,
}

impl OAuthCredentials {
    /// Create a new credential set
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Form body of the refresh grant
    pub fn grant_form(&self) -> [(&'static str, &str); 5] {
        [
            ("grant_type", "refresh_token"),
            ("redirect_uri", REDIRECT_URI),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", self.refresh_token.as_str()),
        ]
    }
}

impl fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Retry budget for transient refresh failures
///
/// Covers 5xx answers, connect failures and timeouts of the token endpoint.
/// A rejected grant is never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshRetry {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub backoff_type: BackoffType,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RefreshRetry {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_type: BackoffType::Exponential,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RefreshRetry {
    /// Delay before retry number `attempt`
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff_type
            .delay(self.initial_backoff, self.max_backoff, attempt)
    }
}

/// Cached token with expiration
#[derive(Debug, Clone)]
pub struct CachedToken {
    /// The access token
    pub token: String,
    /// When the token expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    /// Create a new cached token
    pub fn new(token: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { token, expires_at }
    }

    /// Create a token that expires in N seconds from now
    pub fn expires_in(token: String, seconds: i64) -> Self {
        let expires_at = Utc::now() + chrono::Duration::seconds(seconds);
        Self {
            token,
            expires_at: Some(expires_at),
        }
    }

    /// Check if the token is expired (with 30 second buffer)
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let buffer = chrono::Duration::seconds(30);
                Utc::now() + buffer >= expires_at
            }
            None => false, // No expiration = valid until the API rejects it
        }
    }
}

/// Refresh grant response
///
/// The endpoint answers 200 with `{"error": "..."}` for a rejected refresh
/// token, so every field is optional and checked by the caller.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod type_tests {
    use super::*;

    #[test]
    fn test_cached_token_not_expired() {
        let token = CachedToken::expires_in("test".to_string(), 3600);
        assert!(!token.is_expired());
    }

    #[test]
    fn test_cached_token_expired() {
        let token = CachedToken::expires_in("test".to_string(), -100);
        assert!(token.is_expired());
    }

    #[test]
    fn test_cached_token_within_buffer_is_expired() {
        let token = CachedToken::expires_in("test".to_string(), 10);
        assert!(token.is_expired());
    }

    #[test]
    fn test_cached_token_no_expiration() {
        let token = CachedToken::new("test".to_string(), None);
        assert!(!token.is_expired());
    }

    #[test]
    fn test_grant_form() {
        let creds = OAuthCredentials::new("https://accounts/token", "cid", "secret", "rt");
        let form = creds.grant_form();
        assert!(form.contains(&("grant_type", "refresh_token")));
        assert!(form.contains(&("redirect_uri", "http://localhost")));
        assert!(form.contains(&("client_id", "cid")));
        assert!(form.contains(&("client_secret", "secret")));
        assert!(form.contains(&("refresh_token", "rt")));
    }

    #[test]
    fn test_credentials_debug_redacts_secrets() {
        let creds = OAuthCredentials::new("https://accounts/token", "cid", "s3cr3t", "r3fr3sh");
        let debug = format!("{creds:?}");
        assert!(debug.contains("cid"));
        assert!(!debug.contains("s3cr3t"));
        assert!(!debug.contains("r3fr3sh"));
    }
}
