use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{config::AppConfig, error::ApiError};

/// Raw pagination parameters for the list endpoint. The filter endpoint
/// carries the same two fields on its own params struct.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PageParams {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

/// PageRequest
///
/// A validated page selection. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    /// Parses and bounds the raw `page`/`page_size` values.
    ///
    /// - a non-integer value is a validation error naming the field;
    /// - `page <= 0` is out of range, reported as `page_not_found` exactly
    ///   like a page past the end;
    /// - `page_size` defaults from configuration and is clamped to the
    ///   configured maximum rather than rejected.
    pub fn from_params(
        page: Option<&str>,
        page_size: Option<&str>,
        config: &AppConfig,
    ) -> Result<Self, ApiError> {
        let page = match page.map(str::trim).filter(|v| !v.is_empty()) {
            None => 1,
            Some(raw) => {
                let value: i64 = raw.parse().map_err(|_| {
                    ApiError::validation("page", format!("page must be an integer, got '{raw}'"))
                })?;
                if value <= 0 {
                    return Err(ApiError::PageNotFound(format!(
                        "page {value} is out of range, pages start at 1"
                    )));
                }
                value as u64
            }
        };

        let page_size = match page_size.map(str::trim).filter(|v| !v.is_empty()) {
            None => config.default_page_size,
            Some(raw) => {
                let value: i64 = raw.parse().map_err(|_| {
                    ApiError::validation(
                        "page_size",
                        format!("page_size must be an integer, got '{raw}'"),
                    )
                })?;
                if value <= 0 {
                    return Err(ApiError::validation(
                        "page_size",
                        "page_size must be positive",
                    ));
                }
                (value as u64).min(config.max_page_size)
            }
        };

        Ok(Self { page, page_size })
    }
}

/// Page
///
/// A bounded slice of an ordered result set plus the metadata a client
/// needs to paginate without re-querying for counts.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Page<T> {
    /// Total number of records across all pages.
    pub count: u64,
    /// 1-based number of this page.
    pub page: u64,
    pub page_size: u64,
    /// Number of the next page, when one exists.
    pub next: Option<u64>,
    /// Number of the previous page, when one exists.
    pub previous: Option<u64>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Converts the page's items while keeping the metadata, typically from
    /// domain records to response DTOs.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            page: self.page,
            page_size: self.page_size,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

/// paginate
///
/// Slices `results` into the requested page. The input must already carry a
/// deterministic order (the repositories order by id ascending) so repeated
/// calls over an unchanged set return identical pages.
///
/// A page past the end fails with `page_not_found` instead of clamping; an
/// empty result set still has a valid (empty) first page.
pub fn paginate<T>(results: Vec<T>, request: &PageRequest) -> Result<Page<T>, ApiError> {
    if request.page_size == 0 {
        return Err(ApiError::validation("page_size", "page_size must be positive"));
    }

    let count = results.len() as u64;
    let total_pages = count.div_ceil(request.page_size).max(1);

    if request.page > total_pages {
        return Err(ApiError::PageNotFound(format!(
            "page {} is out of range, last page is {}",
            request.page, total_pages
        )));
    }

    let start = (request.page - 1) * request.page_size;
    let page_items: Vec<T> = results
        .into_iter()
        .skip(start as usize)
        .take(request.page_size as usize)
        .collect();

    let next = (request.page < total_pages).then(|| request.page + 1);
    let previous = (request.page > 1).then(|| request.page - 1);

    Ok(Page {
        count,
        page: request.page,
        page_size: request.page_size,
        next,
        previous,
        results: page_items,
    })
}
