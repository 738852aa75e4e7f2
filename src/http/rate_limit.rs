//! Request throttling shared by every traversal branch
//!
//! The default limiter is a fixed window: at most `max_requests` calls per
//! `window`. The caller that would exceed the ceiling sleeps out the rest of
//! the window, then a new window starts. A burst of `max_requests` can follow
//! a burst at the end of the previous window; that headroom is accepted.
//!
//! `Smooth` mode spreads the same budget evenly with a GCRA limiter from the
//! governor crate instead.

use crate::error::{Error, Result};
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

type DirectGovernor = Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Limiter algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitMode {
    /// Fixed window with a hard ceiling per window
    #[default]
    FixedWindow,
    /// Evenly spaced requests (token bucket)
    Smooth,
}

/// Configuration for rate limiting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Window length in seconds
    pub window_secs: u64,
    /// Ceiling of requests per window
    pub max_requests: u32,
    /// Limiter algorithm
    pub mode: RateLimitMode,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_requests: 30,
            mode: RateLimitMode::FixedWindow,
        }
    }
}

impl RateLimiterConfig {
    /// Create a new fixed-window config
    pub fn new(window_secs: u64, max_requests: u32) -> Self {
        Self {
            window_secs,
            max_requests,
            mode: RateLimitMode::FixedWindow,
        }
    }

    /// Use the smooth limiter
    #[must_use]
    pub fn smooth(mut self) -> Self {
        self.mode = RateLimitMode::Smooth;
        self
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Current fixed window
#[derive(Debug)]
struct RateWindow {
    started_at: Instant,
    count: u32,
}

enum Limiter {
    Fixed(Mutex<RateWindow>),
    Smooth(DirectGovernor),
}

/// Process-wide request throttle
///
/// Shared behind an `Arc` by every branch so the global call volume is what
/// gets limited.
pub struct RateGovernor {
    config: RateLimiterConfig,
    limiter: Limiter,
    acquired: AtomicU64,
    waits: AtomicU64,
}

impl RateGovernor {
    /// Create a new governor with the given config
    pub fn new(config: RateLimiterConfig) -> Self {
        let limiter = match config.mode {
            RateLimitMode::FixedWindow => Limiter::Fixed(Mutex::new(RateWindow {
                started_at: Instant::now(),
                count: 0,
            })),
            RateLimitMode::Smooth => Limiter::Smooth(Governor::direct(quota_from_window(
                config.window(),
                config.max_requests,
            ))),
        };

        Self {
            config,
            limiter,
            acquired: AtomicU64::new(0),
            waits: AtomicU64::new(0),
        }
    }

    /// Wait until one more request may be issued and record it
    ///
    /// The window lock is held while sleeping, so callers queue up behind
    /// the one waiting for the window to reset.
    pub async fn acquire(&self) {
        match &self.limiter {
            Limiter::Fixed(window) => {
                let mut window = window.lock().await;
                if window.count >= self.config.max_requests {
                    let elapsed = window.started_at.elapsed();
                    let window_len = self.config.window();
                    if elapsed < window_len {
                        let sleep_for = window_len - elapsed;
                        self.waits.fetch_add(1, Ordering::SeqCst);
                        info!(
                            sleep_secs = sleep_for.as_secs_f64(),
                            "API limit reached, sleeping for {:.1} seconds",
                            sleep_for.as_secs_f64()
                        );
                        tokio::time::sleep(sleep_for).await;
                    }
                    window.started_at = Instant::now();
                    window.count = 0;
                }
                window.count += 1;
            }
            Limiter::Smooth(governor) => {
                if governor.check().is_err() {
                    self.waits.fetch_add(1, Ordering::SeqCst);
                    governor.until_ready().await;
                }
            }
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
    }

    /// Acquire a slot, returning early with `Cancelled` if the run is aborted
    pub async fn acquire_or_cancel(&self, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            () = self.acquire() => Ok(()),
        }
    }

    /// Total slots handed out
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Number of acquisitions that had to wait
    pub fn waits(&self) -> u64 {
        self.waits.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}

impl std::fmt::Debug for RateGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGovernor")
            .field("config", &self.config)
            .field("acquired", &self.acquired())
            .finish_non_exhaustive()
    }
}

fn quota_from_window(window: Duration, max_requests: u32) -> Quota {
    let burst = NonZeroU32::new(max_requests.max(1)).unwrap_or(NonZeroU32::MIN);
    let seconds_per_cell = (window.as_secs_f64() / f64::from(burst.get())).max(0.001);

    Quota::with_period(Duration::from_secs_f64(seconds_per_cell))
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}

#[cfg(test)]
mod rate_limit_tests {
    use super::*;

    #[test]
    fn test_rate_limiter_config_default() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.window_secs, 60);
        assert_eq!(config.max_requests, 30);
        assert_eq!(config.mode, RateLimitMode::FixedWindow);
    }

    #[test]
    fn test_rate_limiter_config_serde_defaults() {
        let config: RateLimiterConfig = serde_json::from_str(r#"{"mode": "smooth"}"#).unwrap();
        assert_eq!(config.window_secs, 60);
        assert_eq!(config.max_requests, 30);
        assert_eq!(config.mode, RateLimitMode::Smooth);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_acquisitions_do_not_block() {
        let governor = RateGovernor::new(RateLimiterConfig::new(60, 30));
        let start = Instant::now();

        for _ in 0..30 {
            governor.acquire().await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(governor.acquired(), 30);
        assert_eq!(governor.waits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquisition_over_ceiling_waits_out_window() {
        let governor = RateGovernor::new(RateLimiterConfig::new(60, 30));
        let start = Instant::now();

        for _ in 0..30 {
            governor.acquire().await;
        }
        tokio::time::advance(Duration::from_secs(20)).await;

        governor.acquire().await;
        let waited = start.elapsed();

        assert!(waited <= Duration::from_secs(60));
        assert!(waited >= Duration::from_secs(59));
        assert_eq!(governor.waits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_window_after_wait() {
        let governor = RateGovernor::new(RateLimiterConfig::new(60, 3));

        for _ in 0..4 {
            governor.acquire().await;
        }
        let after_wait = Instant::now();

        // The waiting call opened a new window and counted itself: two more fit
        governor.acquire().await;
        governor.acquire().await;
        assert_eq!(after_wait.elapsed(), Duration::ZERO);

        governor.acquire().await;
        assert_eq!(after_wait.elapsed(), Duration::from_secs(60));
        assert_eq!(governor.waits(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_window_resets_without_sleep() {
        let governor = RateGovernor::new(RateLimiterConfig::new(60, 2));
        governor.acquire().await;
        governor.acquire().await;

        tokio::time::advance(Duration::from_secs(61)).await;
        let start = Instant::now();
        governor.acquire().await;

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(governor.waits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_wait() {
        let governor = RateGovernor::new(RateLimiterConfig::new(60, 1));
        governor.acquire().await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = governor.acquire_or_cancel(&cancel).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(governor.acquired(), 1);
    }

    #[tokio::test]
    async fn test_smooth_mode_allows_burst() {
        let governor = RateGovernor::new(RateLimiterConfig::new(60, 5).smooth());
        for _ in 0..5 {
            governor.acquire().await;
        }
        assert_eq!(governor.acquired(), 5);
        assert_eq!(governor.waits(), 0);
    }
}
