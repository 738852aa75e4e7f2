//! Pagination strategy implementations
//!
//! Each strategy handles a specific pagination pattern.

use super::types::{advance, NextPage, PageToken, PaginationConfig, Paginator};
use crate::types::{lookup_path, JsonValue};
use reqwest::header::HeaderMap;

// ============================================================================
// No Pagination
// ============================================================================

/// Single request, always terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPaginator;

impl Paginator for NoPaginator {
    fn request_params(&self, _token: Option<&PageToken>) -> Vec<(String, String)> {
        Vec::new()
    }

    fn next_page(
        &self,
        _body: &JsonValue,
        _headers: &HeaderMap,
        _previous: Option<&PageToken>,
    ) -> NextPage {
        NextPage::Done
    }
}

// ============================================================================
// Index-Range Pagination
// ============================================================================

/// Offset pagination over the props endpoints
///
/// Every request carries `index` (1-based) and `range`; the body's
/// `nextIndex` is the next offset. A missing or null field is terminal.
#[derive(Debug, Clone)]
pub struct IndexRangePaginator {
    pub index_param: String,
    pub range_param: String,
    pub next_field: String,
    pub start_index: u64,
    pub page_size: u32,
}

impl IndexRangePaginator {
    /// Create a paginator with the `index`/`range`/`nextIndex` names
    pub fn new(page_size: u32) -> Self {
        Self {
            index_param: "index".to_string(),
            range_param: "range".to_string(),
            next_field: "nextIndex".to_string(),
            start_index: 1,
            page_size,
        }
    }
}

impl Paginator for IndexRangePaginator {
    fn request_params(&self, token: Option<&PageToken>) -> Vec<(String, String)> {
        let index = match token {
            Some(token) => token.to_string(),
            None => self.start_index.to_string(),
        };
        vec![
            (self.index_param.clone(), index),
            (self.range_param.clone(), self.page_size.to_string()),
        ]
    }

    fn next_page(
        &self,
        body: &JsonValue,
        _headers: &HeaderMap,
        previous: Option<&PageToken>,
    ) -> NextPage {
        let next = lookup_path(body, &self.next_field).and_then(PageToken::from_json);
        advance(next, previous)
    }
}

// ============================================================================
// Page-Param Pagination
// ============================================================================

/// Token pagination with an optional sort order
///
/// The first request carries no page parameter. When the stream declares a
/// replication key every request is sorted ascending by it, so a bookmark
/// can be advanced monotonically.
#[derive(Debug, Clone)]
pub struct PageParamPaginator {
    pub page_param: String,
    pub next_path: String,
    pub next_header: Option<String>,
    pub sort_key: Option<String>,
}

impl PageParamPaginator {
    /// Create a paginator reading `next_index` from the body
    pub fn new() -> Self {
        Self {
            page_param: "page".to_string(),
            next_path: "next_index".to_string(),
            next_header: None,
            sort_key: None,
        }
    }

    /// Fall back to a response header when the body carries no token
    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.next_header = Some(header.into());
        self
    }

    /// Sort ascending by the given field
    #[must_use]
    pub fn sorted_by(mut self, key: impl Into<String>) -> Self {
        self.sort_key = Some(key.into());
        self
    }

    fn token_from_header(&self, headers: &HeaderMap) -> Option<PageToken> {
        let name = self.next_header.as_deref()?;
        let value = headers.get(name)?.to_str().ok()?.trim();
        (!value.is_empty()).then(|| PageToken::new(value))
    }
}

impl Default for PageParamPaginator {
    fn default() -> Self {
        Self::new()
    }
}

impl Paginator for PageParamPaginator {
    fn request_params(&self, token: Option<&PageToken>) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(3);
        if let Some(token) = token {
            params.push((self.page_param.clone(), token.to_string()));
        }
        if let Some(key) = &self.sort_key {
            params.push(("sort".to_string(), "asc".to_string()));
            params.push(("order_by".to_string(), key.clone()));
        }
        params
    }

    fn next_page(
        &self,
        body: &JsonValue,
        headers: &HeaderMap,
        previous: Option<&PageToken>,
    ) -> NextPage {
        let next = match lookup_path(body, &self.next_path) {
            Some(value) => PageToken::from_json(value),
            None => self.token_from_header(headers),
        };
        advance(next, previous)
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Build the paginator for a stream
///
/// `default_page_size` applies when an index-range stream declares none;
/// `sort_key` is the stream's replication key.
pub fn create_paginator(
    config: &PaginationConfig,
    default_page_size: u32,
    sort_key: Option<&str>,
) -> Box<dyn Paginator> {
    match config {
        PaginationConfig::None => Box::new(NoPaginator),
        PaginationConfig::IndexRange {
            index_param,
            range_param,
            next_field,
            start_index,
            page_size,
        } => Box::new(IndexRangePaginator {
            index_param: index_param.clone(),
            range_param: range_param.clone(),
            next_field: next_field.clone(),
            start_index: *start_index,
            page_size: page_size.unwrap_or(default_page_size),
        }),
        PaginationConfig::PageParam {
            page_param,
            next_path,
            next_header,
        } => Box::new(PageParamPaginator {
            page_param: page_param.clone(),
            next_path: next_path.clone(),
            next_header: next_header.clone(),
            sort_key: sort_key.map(str::to_string),
        }),
    }
}
