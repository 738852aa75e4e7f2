//! Pagination module
//!
//! Supports: None, Index-Range (`index`/`range` + `nextIndex`), Page-Param
//! (`page` + `next_index` or a header)
//!
//! # Overview
//!
//! A paginator only maps a response to the next [`PageToken`]. The page loop
//! itself lives in the engine, one loop per (stream, context) pair, bounded
//! by the configured maximum number of pages.

mod strategies;
mod types;

pub use strategies::{create_paginator, IndexRangePaginator, NoPaginator, PageParamPaginator};
pub use types::{NextPage, PageToken, PaginationConfig, Paginator};

#[cfg(test)]
mod tests;
