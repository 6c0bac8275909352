//! Generic cursor-following pagination.
//!
//! Bitbucket Server pages every collection endpoint with a
//! `start`/`isLastPage`/`nextPageStart` envelope. The helpers here turn a
//! page-fetch function into a single concatenated collection, fetching
//! strictly sequentially so at most one request per query is ever in flight.

use crate::error::AppError;
use serde::Deserialize;
use std::future::Future;

/// One page of a paged Bitbucket response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Number of values on this page.
    #[serde(default)]
    pub size: u64,

    /// Page size limit the server applied.
    #[serde(default)]
    pub limit: u64,

    /// Whether this is the final page.
    pub is_last_page: bool,

    /// The page's values.
    pub values: Vec<T>,

    /// Offset this page started at.
    #[serde(default)]
    pub start: u64,

    /// Server-provided cursor for the next page; absent on the last page.
    pub next_page_start: Option<u64>,
}

/// Fetch every page and concatenate the values, starting at offset 0.
///
/// The server is authoritative on the cursor: each follow-up request uses
/// the previous response's `nextPageStart`, never a computed increment.
/// The first error is propagated unchanged; retry policy belongs to the
/// caller.
pub async fn fetch_all_pages<T, F, Fut>(fetch: F) -> Result<Vec<T>, AppError>
where
    F: Fn(u64) -> Fut,
    Fut: Future<Output = Result<Page<T>, AppError>>,
{
    fetch_pages(fetch, u64::MAX).await
}

/// Fetch at most `max_pages` pages and concatenate the values.
///
/// Used by the team-membership engine to bound how much history one
/// repository may contribute.
pub async fn fetch_pages<T, F, Fut>(fetch: F, max_pages: u64) -> Result<Vec<T>, AppError>
where
    F: Fn(u64) -> Fut,
    Fut: Future<Output = Result<Page<T>, AppError>>,
{
    let mut all_values = Vec::new();
    let mut start = 0u64;
    let mut fetched_pages = 0u64;

    while fetched_pages < max_pages {
        let page = fetch(start).await?;
        fetched_pages += 1;

        all_values.extend(page.values);

        if page.is_last_page {
            break;
        }

        match page.next_page_start {
            Some(next) => start = next,
            // A non-final page without a cursor is a server contract
            // violation; stop rather than refetch the same offset forever.
            None => {
                log::warn!("paged response missing nextPageStart before last page");
                break;
            }
        }
    }

    Ok(all_values)
}
