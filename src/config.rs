//! Tap configuration
//!
//! Loaded from a JSON file (`--config`) or inline JSON (`--config-json`).
//! Only the credentials and the two URLs are required; every tuning knob
//! has a default.

use crate::auth::{OAuthCredentials, RefreshRetry};
use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::types::BackoffType;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Tap Config
// ============================================================================

/// Complete tap configuration
#[derive(Clone, Deserialize)]
pub struct TapConfig {
    /// API base URL, e.g. `https://sprintsapi.zoho.com/zsapi`
    #[serde(default)]
    pub api_url: String,

    /// OAuth token endpoint, e.g. `https://accounts.zoho.com/oauth/v2/token`
    #[serde(default)]
    pub oauth_url: String,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    #[serde(default)]
    pub refresh_token: String,

    /// Earliest replication value to extract when no bookmark exists
    #[serde(default)]
    pub start_date: Option<String>,

    /// User-Agent header for API requests
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Request throttling
    #[serde(default)]
    pub rate_limit: RateLimiterConfig,

    /// Retries for 5xx responses and transport timeouts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between retries
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Upper bound on pages fetched by one stream instance
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Default `range` for index-range pagination
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Stream instances paginating at once (1 = sequential traversal)
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_max_retries() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_pages() -> u32 {
    10_000
}

fn default_page_size() -> u32 {
    100
}

fn default_max_concurrency() -> usize {
    1
}

/// Retry backoff settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    #[serde(rename = "type")]
    pub backoff_type: BackoffType,
    pub initial_ms: u64,
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            backoff_type: BackoffType::Exponential,
            initial_ms: 500,
            max_ms: 30_000,
        }
    }
}

impl TapConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file '{}': {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("Failed to parse config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from inline JSON, falling back to a file
    pub fn load(file: Option<&Path>, inline: Option<&str>) -> Result<Self> {
        match (inline, file) {
            (Some(json), _) => Self::from_json(json),
            (None, Some(path)) => Self::from_file(path),
            (None, None) => Err(Error::config(
                "No configuration provided. Use --config or --config-json",
            )),
        }
    }

    /// Check required fields and value ranges
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("api_url", &self.api_url),
            ("oauth_url", &self.oauth_url),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("refresh_token", &self.refresh_token),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::missing_field(field));
            }
        }

        for (field, value) in [("api_url", &self.api_url), ("oauth_url", &self.oauth_url)] {
            let parsed = url::Url::parse(value)
                .map_err(|e| Error::invalid_value(field, format!("'{value}' is not a URL: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::invalid_value(field, "scheme must be http or https"));
            }
        }

        self.start_date()?;

        let positive = [
            ("rate_limit.window_secs", self.rate_limit.window_secs),
            ("rate_limit.max_requests", u64::from(self.rate_limit.max_requests)),
            ("timeout_secs", self.timeout_secs),
            ("max_pages", u64::from(self.max_pages)),
            ("page_size", u64::from(self.page_size)),
            ("max_concurrency", self.max_concurrency as u64),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(Error::invalid_value(field, "must be greater than zero"));
            }
        }

        if self.backoff.max_ms < self.backoff.initial_ms {
            return Err(Error::invalid_value(
                "backoff.max_ms",
                "must not be smaller than backoff.initial_ms",
            ));
        }

        Ok(())
    }

    /// Parsed `start_date` (RFC 3339 or a plain `YYYY-MM-DD` date)
    pub fn start_date(&self) -> Result<Option<DateTime<Utc>>> {
        let Some(raw) = self.start_date.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if raw.is_empty() {
            return Ok(None);
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Some(dt.with_timezone(&Utc)));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| Some(naive.and_utc()))
            .ok_or_else(|| Error::invalid_value("start_date", format!("'{raw}' is not an RFC 3339 date")))
    }

    /// Credentials for the refresh-token grant
    pub fn credentials(&self) -> OAuthCredentials {
        OAuthCredentials::new(
            self.oauth_url.clone(),
            self.client_id.clone(),
            self.client_secret.clone(),
            self.refresh_token.clone(),
        )
    }

    /// Retry budget for the token endpoint, shared with API requests
    pub fn refresh_retry(&self) -> RefreshRetry {
        RefreshRetry {
            max_retries: self.max_retries,
            backoff_type: self.backoff.backoff_type,
            initial_backoff: Duration::from_millis(self.backoff.initial_ms),
            max_backoff: Duration::from_millis(self.backoff.max_ms),
        }
    }

    /// HTTP client settings
    pub fn http_config(&self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .base_url(self.api_url.clone())
            .timeout(Duration::from_secs(self.timeout_secs))
            .max_retries(self.max_retries)
            .backoff(
                self.backoff.backoff_type,
                Duration::from_millis(self.backoff.initial_ms),
                Duration::from_millis(self.backoff.max_ms),
            );
        if let Some(agent) = &self.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        builder.build()
    }
}

impl std::fmt::Debug for TapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapConfig")
            .field("api_url", &self.api_url)
            .field("oauth_url", &self.oauth_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("start_date", &self.start_date)
            .field("user_agent", &self.user_agent)
            .field("rate_limit", &self.rate_limit)
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_pages", &self.max_pages)
            .field("page_size", &self.page_size)
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::RateLimitMode;
    use chrono::TimeZone;
    use std::io::Write;
    use test_case::test_case;

    const MINIMAL: &str = r#"{
        "api_url": "https://sprintsapi.zoho.com/zsapi",
        "oauth_url": "https://accounts.zoho.com/oauth/v2/token",
        "client_id": "1000.ABC",
        "client_secret": "shh",
        "refresh_token": "1000.refresh"
    }"#;

    fn with(extra: &str) -> String {
        let mut value: serde_json::Value = serde_json::from_str(MINIMAL).unwrap();
        let extra: serde_json::Value = serde_json::from_str(extra).unwrap();
        for (k, v) in extra.as_object().unwrap() {
            value[k] = v.clone();
        }
        value.to_string()
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = TapConfig::from_json(MINIMAL).unwrap();

        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.rate_limit.max_requests, 30);
        assert_eq!(config.rate_limit.mode, RateLimitMode::FixedWindow);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.backoff, BackoffConfig::default());
        assert_eq!(config.timeout_secs, 300);
        assert_eq!(config.max_pages, 10_000);
        assert_eq!(config.page_size, 100);
        assert_eq!(config.max_concurrency, 1);
        assert!(config.start_date().unwrap().is_none());
    }

    #[test_case("api_url")]
    #[test_case("oauth_url")]
    #[test_case("client_id")]
    #[test_case("client_secret")]
    #[test_case("refresh_token")]
    fn test_missing_required_field(field: &str) {
        let mut value: serde_json::Value = serde_json::from_str(MINIMAL).unwrap();
        value.as_object_mut().unwrap().remove(field);

        let err = TapConfig::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, Error::MissingConfigField { field: ref f } if f == field));
    }

    #[test]
    fn test_empty_required_field() {
        let err = TapConfig::from_json(&with(r#"{"client_id": "  "}"#)).unwrap_err();
        assert!(matches!(err, Error::MissingConfigField { .. }));
    }

    #[test]
    fn test_invalid_url() {
        let err = TapConfig::from_json(&with(r#"{"api_url": "not a url"}"#)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { ref field, .. } if field == "api_url"));

        let err = TapConfig::from_json(&with(r#"{"oauth_url": "ftp://accounts"}"#)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { ref field, .. } if field == "oauth_url"));
    }

    #[test]
    fn test_start_date_formats() {
        let config = TapConfig::from_json(&with(r#"{"start_date": "2024-01-01T00:00:00Z"}"#)).unwrap();
        assert_eq!(
            config.start_date().unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );

        let config = TapConfig::from_json(&with(r#"{"start_date": "2024-03-05"}"#)).unwrap();
        assert_eq!(
            config.start_date().unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap())
        );

        let err = TapConfig::from_json(&with(r#"{"start_date": "yesterday"}"#)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { .. }));
    }

    #[test]
    fn test_tuning_overrides() {
        let config = TapConfig::from_json(&with(
            r#"{
                "rate_limit": {"max_requests": 10, "mode": "smooth"},
                "backoff": {"type": "constant", "initial_ms": 10},
                "max_concurrency": 4,
                "user_agent": "tap-test/1.0"
            }"#,
        ))
        .unwrap();

        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.rate_limit.max_requests, 10);
        assert_eq!(config.rate_limit.mode, RateLimitMode::Smooth);
        assert_eq!(config.backoff.backoff_type, BackoffType::Constant);
        assert_eq!(config.backoff.max_ms, 30_000);
        assert_eq!(config.max_concurrency, 4);

        let http = config.http_config();
        assert_eq!(http.base_url, "https://sprintsapi.zoho.com/zsapi");
        assert_eq!(http.user_agent, "tap-test/1.0");
        assert_eq!(http.initial_backoff, Duration::from_millis(10));
    }

    #[test_case(r#"{"page_size": 0}"# ; "page size")]
    #[test_case(r#"{"max_pages": 0}"# ; "max pages")]
    #[test_case(r#"{"max_concurrency": 0}"# ; "concurrency")]
    #[test_case(r#"{"rate_limit": {"max_requests": 0}}"# ; "ceiling")]
    #[test_case(r#"{"backoff": {"initial_ms": 100, "max_ms": 10}}"# ; "backoff bounds")]
    fn test_invalid_tuning(extra: &str) {
        let err = TapConfig::from_json(&with(extra)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { .. }));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = TapConfig::from_json(MINIMAL).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("shh"));
        assert!(!debug.contains("1000.refresh"));
        assert!(debug.contains("1000.ABC"));
    }

    #[test]
    fn test_load_sources() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let from_file = TapConfig::load(Some(file.path()), None).unwrap();
        assert_eq!(from_file.client_id, "1000.ABC");

        let inline = with(r#"{"client_id": "inline"}"#);
        let from_inline = TapConfig::load(Some(file.path()), Some(&inline)).unwrap();
        assert_eq!(from_inline.client_id, "inline");

        assert!(matches!(
            TapConfig::load(None, None).unwrap_err(),
            Error::Config { .. }
        ));
    }

    #[test]
    fn test_credentials() {
        let config = TapConfig::from_json(MINIMAL).unwrap();
        let credentials = config.credentials();
        assert_eq!(credentials.token_url, "https://accounts.zoho.com/oauth/v2/token");
        assert_eq!(credentials.refresh_token, "1000.refresh");
    }
}
