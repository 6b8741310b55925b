use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

use crate::error::ApiError;

/// Upper bound on `size`.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Window
///
/// A resolved `LIMIT` / `OFFSET` pair, ready to bind into a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub limit: i64,
    pub offset: i64,
}

/// paginate
///
/// Zero-based paging: `offset = page * size`, `limit = size`. Rejects a non-positive
/// size, a negative page, an oversized page and an offset that would overflow.
pub fn paginate(size: i64, page: i64) -> Result<Window, ApiError> {
    if size <= 0 {
        return Err(ApiError::validation("size must be greater than 0"));
    }
    if size > MAX_PAGE_SIZE {
        return Err(ApiError::validation(format!(
            "size must not exceed {}",
            MAX_PAGE_SIZE
        )));
    }
    if page < 0 {
        return Err(ApiError::validation("page must not be negative"));
    }

    let offset = page
        .checked_mul(size)
        .ok_or_else(|| ApiError::validation("page is out of range"))?;

    Ok(Window {
        limit: size,
        offset,
    })
}

/// Page
///
/// One page of a listing plus the number of pages available at this size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub total_pages: i64,
    pub content: Vec<T>,
}

/// build_page_result
///
/// `total_pages = ceil(total_count / size)`. A non-positive size cannot page anything
/// and yields zero pages rather than a division by zero.
pub fn build_page_result<T>(total_count: i64, size: i64, rows: Vec<T>) -> Page<T> {
    let total_pages = if size <= 0 || total_count <= 0 {
        0
    } else {
        (total_count + size - 1) / size
    };

    Page {
        total_pages,
        content: rows,
    }
}

/// Listing
///
/// A list endpoint answers with a page envelope when paging parameters are given and
/// with a bare array otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Listing<T> {
    Page(Page<T>),
    All(Vec<T>),
}

/// PageQuery
///
/// Query parameters accepted by list endpoints.
#[derive(Debug, Clone, Default, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Zero-based page index.
    pub page: Option<i64>,
    /// Number of rows per page.
    pub size: Option<i64>,
}

impl PageQuery {
    /// `Ok(None)` means "no paging requested"; giving only one of the two parameters is
    /// a client error.
    pub fn window(&self) -> Result<Option<Window>, ApiError> {
        match (self.size, self.page) {
            (None, None) => Ok(None),
            (Some(size), Some(page)) => paginate(size, page).map(Some),
            _ => Err(ApiError::validation(
                "page and size must be provided together",
            )),
        }
    }
}
