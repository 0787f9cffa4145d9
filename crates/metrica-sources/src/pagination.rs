//! Cursor-based pagination.
//!
//! Upstream search and query endpoints return one page at a time plus an
//! opaque continuation cursor. [`page_stream`] turns a page-fetching
//! closure into a lazy stream that follows the cursor until the upstream
//! stops returning one, and fails once `max_pages` pages have been fetched
//! without reaching the end.

use crate::error::{Result, SourceError};
use futures::{Stream, TryStreamExt};
use std::future::Future;

/// Hard cap on pages fetched for a single query.
pub const MAX_PAGES: usize = 500;

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Cursor for the next page; `None` (or empty) on the last page
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// A final page with no continuation.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }
}

struct Cursor<F> {
    fetch: F,
    next: Option<String>,
    pages: usize,
    done: bool,
}

/// Lazily fetches pages, yielding each page's items.
///
/// `fetch` receives `None` for the first page and the previous page's
/// cursor afterwards.
pub fn page_stream<T, F, Fut>(
    service: &'static str,
    max_pages: usize,
    fetch: F,
) -> impl Stream<Item = Result<Vec<T>>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let state = Cursor {
        fetch,
        next: None,
        pages: 0,
        done: false,
    };

    futures::stream::try_unfold(state, move |mut state| async move {
        if state.done {
            return Ok(None);
        }
        if state.pages >= max_pages {
            return Err(SourceError::PaginationLimit {
                service,
                pages: state.pages,
            });
        }

        let page = (state.fetch)(state.next.take()).await?;
        state.pages += 1;

        match page.next_cursor {
            Some(cursor) if !cursor.is_empty() => state.next = Some(cursor),
            _ => {
                tracing::debug!(service, pages = state.pages, "Pagination complete");
                state.done = true;
            }
        }

        Ok(Some((page.items, state)))
    })
}

/// Follows every page and returns all items in upstream order.
pub async fn collect_pages<T, F, Fut>(
    service: &'static str,
    max_pages: usize,
    fetch: F,
) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let pages: Vec<Vec<T>> = page_stream(service, max_pages, fetch).try_collect().await?;
    Ok(pages.into_iter().flatten().collect())
}
