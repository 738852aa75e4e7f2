//! Tests for pagination module

use super::*;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::json;

fn token(s: &str) -> PageToken {
    PageToken::new(s)
}

// ============================================================================
// PageToken / NextPage Tests
// ============================================================================

#[test]
fn test_page_token_from_json() {
    assert_eq!(PageToken::from_json(&json!(101)), Some(token("101")));
    assert_eq!(PageToken::from_json(&json!("2")), Some(token("2")));
    assert_eq!(PageToken::from_json(&json!(null)), None);
    assert_eq!(PageToken::from_json(&json!("")), None);
    assert_eq!(PageToken::from_json(&json!(0)), None);
    assert_eq!(PageToken::from_json(&json!(false)), None);
    assert_eq!(PageToken::from_json(&json!({"a": 1})), None);
}

#[test]
fn test_next_page_done() {
    let next = NextPage::Done;
    assert!(next.is_done());
    assert!(!next.is_continue());
    assert!(NextPage::Continue(token("2")).is_continue());
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_config_deserialize_defaults() {
    let config: PaginationConfig = serde_yaml::from_str("type: index_range").unwrap();
    assert_eq!(config, PaginationConfig::index_range());

    let config: PaginationConfig = serde_yaml::from_str(
        "type: page_param\nnext_header: X-Next-Page",
    )
    .unwrap();
    assert_eq!(config, PaginationConfig::page_param());

    let config: PaginationConfig = serde_yaml::from_str("type: none").unwrap();
    assert!(!config.is_paginated());
}

#[test]
fn test_config_deserialize_overrides() {
    let config: PaginationConfig =
        serde_yaml::from_str("type: index_range\npage_size: 50\nnext_field: next").unwrap();

    match config {
        PaginationConfig::IndexRange {
            page_size,
            next_field,
            start_index,
            ..
        } => {
            assert_eq!(page_size, Some(50));
            assert_eq!(next_field, "next");
            assert_eq!(start_index, 1);
        }
        other => panic!("unexpected config: {other:?}"),
    }
}

// ============================================================================
// NoPaginator Tests
// ============================================================================

#[test]
fn test_no_paginator_is_always_terminal() {
    let paginator = NoPaginator;
    assert!(paginator.request_params(None).is_empty());
    let body = json!({"next_index": 2, "nextIndex": 101});
    assert!(paginator.next_page(&body, &HeaderMap::new(), None).is_done());
}

// ============================================================================
// IndexRangePaginator Tests
// ============================================================================

#[test]
fn test_index_range_first_request() {
    let paginator = IndexRangePaginator::new(100);
    assert_eq!(
        paginator.request_params(None),
        vec![
            ("index".to_string(), "1".to_string()),
            ("range".to_string(), "100".to_string())
        ]
    );
}

#[test]
fn test_index_range_follows_next_index() {
    let paginator = IndexRangePaginator::new(100);
    let headers = HeaderMap::new();

    let next = paginator.next_page(&json!({"nextIndex": 101, "ids": []}), &headers, None);
    assert_eq!(next, NextPage::Continue(token("101")));

    assert_eq!(
        paginator.request_params(Some(&token("101"))),
        vec![
            ("index".to_string(), "101".to_string()),
            ("range".to_string(), "100".to_string())
        ]
    );
}

#[test]
fn test_index_range_missing_next_index_is_terminal() {
    let paginator = IndexRangePaginator::new(100);
    let headers = HeaderMap::new();

    assert!(paginator.next_page(&json!({"ids": ["a"]}), &headers, None).is_done());
    assert!(paginator
        .next_page(&json!({"nextIndex": null}), &headers, None)
        .is_done());
    assert!(paginator.next_page(&json!([]), &headers, None).is_done());
}

#[test]
fn test_index_range_ignores_headers() {
    let paginator = IndexRangePaginator::new(100);
    let mut headers = HeaderMap::new();
    headers.insert("X-Next-Page", HeaderValue::from_static("3"));

    assert!(paginator.next_page(&json!({}), &headers, None).is_done());
}

#[test]
fn test_repeated_token_is_terminal() {
    let paginator = IndexRangePaginator::new(100);
    let previous = token("101");

    let next = paginator.next_page(&json!({"nextIndex": 101}), &HeaderMap::new(), Some(&previous));
    assert!(next.is_done());
}

// ============================================================================
// PageParamPaginator Tests
// ============================================================================

#[test]
fn test_page_param_first_request_has_no_page() {
    let paginator = PageParamPaginator::new();
    assert!(paginator.request_params(None).is_empty());
    assert_eq!(
        paginator.request_params(Some(&token("2"))),
        vec![("page".to_string(), "2".to_string())]
    );
}

#[test]
fn test_page_param_sort_by_replication_key() {
    let paginator = PageParamPaginator::new().sorted_by("lastModifiedTime");
    assert_eq!(
        paginator.request_params(Some(&token("3"))),
        vec![
            ("page".to_string(), "3".to_string()),
            ("sort".to_string(), "asc".to_string()),
            ("order_by".to_string(), "lastModifiedTime".to_string())
        ]
    );
}

#[test]
fn test_page_param_body_token() {
    let paginator = PageParamPaginator::new();
    let next = paginator.next_page(&json!({"next_index": "2"}), &HeaderMap::new(), None);
    assert_eq!(next, NextPage::Continue(token("2")));
}

#[test]
fn test_page_param_header_fallback() {
    let paginator = PageParamPaginator::new().with_header("X-Next-Page");
    let mut headers = HeaderMap::new();
    headers.insert("X-Next-Page", HeaderValue::from_static("4"));

    let next = paginator.next_page(&json!({"portals": []}), &headers, None);
    assert_eq!(next, NextPage::Continue(token("4")));

    // A null body token is explicit: the header is not consulted
    let next = paginator.next_page(&json!({"next_index": null}), &headers, None);
    assert!(next.is_done());
}

#[test]
fn test_page_param_no_token_anywhere_is_terminal() {
    let paginator = PageParamPaginator::new().with_header("X-Next-Page");
    assert!(paginator
        .next_page(&json!({"portals": []}), &HeaderMap::new(), None)
        .is_done());
}

// ============================================================================
// Factory Tests
// ============================================================================

#[test]
fn test_create_paginator_uses_default_page_size() {
    let paginator = create_paginator(&PaginationConfig::index_range(), 25, None);
    assert_eq!(
        paginator.request_params(None),
        vec![
            ("index".to_string(), "1".to_string()),
            ("range".to_string(), "25".to_string())
        ]
    );
}

#[test]
fn test_create_paginator_page_param_sort_key() {
    let paginator = create_paginator(&PaginationConfig::page_param(), 100, Some("createdTime"));
    assert_eq!(
        paginator.request_params(None),
        vec![
            ("sort".to_string(), "asc".to_string()),
            ("order_by".to_string(), "createdTime".to_string())
        ]
    );
}
