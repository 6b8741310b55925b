use axum::http::StatusCode;
use cinema_api::pagination::{
    Listing, MAX_PAGE_SIZE, PageQuery, Window, build_page_result, paginate,
};

#[test]
fn test_paginate_computes_offset_from_zero_based_page() {
    assert_eq!(paginate(10, 0).unwrap(), Window { limit: 10, offset: 0 });
    assert_eq!(paginate(10, 2).unwrap(), Window { limit: 10, offset: 20 });
    assert_eq!(paginate(1, 7).unwrap(), Window { limit: 1, offset: 7 });
}

#[test]
fn test_paginate_rejects_invalid_input() {
    for (size, page) in [(0, 0), (-1, 0), (10, -1), (MAX_PAGE_SIZE + 1, 0)] {
        let err = paginate(size, page).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST, "size={size} page={page}");
    }
}

#[test]
fn test_paginate_rejects_overflowing_offset() {
    let err = paginate(MAX_PAGE_SIZE, i64::MAX).unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn test_total_pages_is_ceiling() {
    assert_eq!(build_page_result(25, 10, vec![0; 10]).total_pages, 3);
    assert_eq!(build_page_result(20, 10, vec![0; 10]).total_pages, 2);
    assert_eq!(build_page_result(1, 10, vec![0]).total_pages, 1);
    assert_eq!(build_page_result::<u8>(0, 10, vec![]).total_pages, 0);
}

#[test]
fn test_zero_size_yields_zero_pages() {
    let page = build_page_result(25, 0, vec![1, 2, 3]);
    assert_eq!(page.total_pages, 0);
    assert_eq!(page.content, vec![1, 2, 3]);
}

#[test]
fn test_page_query_requires_both_parameters() {
    let none = PageQuery::default();
    assert_eq!(none.window().unwrap(), None);

    let both = PageQuery {
        page: Some(1),
        size: Some(5),
    };
    assert_eq!(
        both.window().unwrap(),
        Some(Window { limit: 5, offset: 5 })
    );

    let only_size = PageQuery {
        page: None,
        size: Some(5),
    };
    assert_eq!(
        only_size.window().unwrap_err().status(),
        StatusCode::BAD_REQUEST
    );
}

#[test]
fn test_listing_serializes_untagged() {
    let paged: Listing<i32> = Listing::Page(build_page_result(3, 2, vec![1, 2]));
    assert_eq!(
        serde_json::to_value(&paged).unwrap(),
        serde_json::json!({ "totalPages": 2, "content": [1, 2] })
    );

    let all: Listing<i32> = Listing::All(vec![1, 2, 3]);
    assert_eq!(
        serde_json::to_value(&all).unwrap(),
        serde_json::json!([1, 2, 3])
    );
}
