//! HTTP layer
//!
//! Everything between a resolved request and a validated JSON body:
//!
//! - **Rate limiting**: one [`RateGovernor`] shared by every branch of a run
//! - **Authentication**: bearer tokens from the shared token authority
//! - **Classification**: lockout, auth, client and server errors
//! - **Retries**: 5xx and transport timeouts with constant, linear or exponential backoff

mod classify;
mod client;
mod rate_limit;

pub use classify::{classify, is_lockout, ResponseClass, LOCKOUT_CODE};
pub use client::{ApiRequest, ApiResponse, HttpClient, HttpClientConfig, HttpClientConfigBuilder};
pub use rate_limit::{RateGovernor, RateLimitMode, RateLimiterConfig};
