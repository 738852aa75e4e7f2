//! Authentication module
//!
//! OAuth2 refresh-token grant against the Zoho accounts endpoint.
//!
//! The [`TokenAuthority`] owns the single cached access token for the run.
//! It is constructed once per session and shared (via `Arc`) with every
//! traversal branch; refreshes are single-flight across all of them.

mod authority;
mod types;

pub use authority::TokenAuthority;
pub use types::{CachedToken, OAuthCredentials, RefreshRetry};
