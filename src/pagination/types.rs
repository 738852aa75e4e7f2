//! Pagination types and traits
//!
//! Defines the core pagination abstractions used by all strategies.

use crate::types::JsonValue;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque position of the next page of one (stream, context) request sequence
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageToken(String);

impl PageToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read a token from a JSON value
    ///
    /// Null, `false`, `0` and the empty string all mean "no next page".
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::String(s) if !s.is_empty() => Some(Self(s.clone())),
            JsonValue::Number(n) if n.as_f64() != Some(0.0) => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// Request again with this token
    Continue(PageToken),
    /// No more pages
    Done,
}

impl NextPage {
    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Check if this is a continue result
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue(_))
    }
}

/// Pagination mode declared by a stream
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationConfig {
    /// One request per stream instance
    #[default]
    None,

    /// `index`/`range` offsets, next offset read from a body field
    IndexRange {
        /// Query parameter carrying the 1-based offset
        #[serde(default = "default_index_param")]
        index_param: String,
        /// Query parameter carrying the page size
        #[serde(default = "default_range_param")]
        range_param: String,
        /// Body field holding the next offset
        #[serde(default = "default_next_index_field")]
        next_field: String,
        /// First offset
        #[serde(default = "default_start_index")]
        start_index: u64,
        /// Endpoint-specific page size, overriding the configured one
        #[serde(default)]
        page_size: Option<u32>,
    },

    /// `page` token, next token read from a body path or a response header
    PageParam {
        /// Query parameter carrying the token
        #[serde(default = "default_page_param")]
        page_param: String,
        /// Body path holding the next token
        #[serde(default = "default_next_page_path")]
        next_path: String,
        /// Header consulted when the body has no token
        #[serde(default)]
        next_header: Option<String>,
    },
}

fn default_index_param() -> String {
    "index".to_string()
}

fn default_range_param() -> String {
    "range".to_string()
}

fn default_next_index_field() -> String {
    "nextIndex".to_string()
}

fn default_start_index() -> u64 {
    1
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_next_page_path() -> String {
    "next_index".to_string()
}

impl PaginationConfig {
    /// Create index-range pagination with the usual field names
    pub fn index_range() -> Self {
        Self::IndexRange {
            index_param: default_index_param(),
            range_param: default_range_param(),
            next_field: default_next_index_field(),
            start_index: default_start_index(),
            page_size: None,
        }
    }

    /// Create page-param pagination with the usual field names
    pub fn page_param() -> Self {
        Self::PageParam {
            page_param: default_page_param(),
            next_path: default_next_page_path(),
            next_header: Some("X-Next-Page".to_string()),
        }
    }

    pub fn is_paginated(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Core trait for pagination strategies
///
/// Implementations are stateless; the token is threaded through by the
/// caller's page loop, so two contexts of one stream never share state.
pub trait Paginator: Send + Sync {
    /// Query parameters for the request that fetches `token` (first page: `None`)
    fn request_params(&self, token: Option<&PageToken>) -> Vec<(String, String)>;

    /// Compute the next token from a validated response
    fn next_page(
        &self,
        body: &JsonValue,
        headers: &HeaderMap,
        previous: Option<&PageToken>,
    ) -> NextPage;
}

/// Guard against a server that hands back the token it was just given
pub(crate) fn advance(next: Option<PageToken>, previous: Option<&PageToken>) -> NextPage {
    match next {
        Some(token) if Some(&token) == previous => {
            tracing::warn!("Next page token {token} repeats the previous one, stopping");
            NextPage::Done
        }
        Some(token) => NextPage::Continue(token),
        None => NextPage::Done,
    }
}
