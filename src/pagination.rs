// bcctl - CLI for the BigCommerce catalog REST API
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Draining of paginated list endpoints.

use serde::Deserialize;
use std::future::Future;
use thiserror::Error;

/// Upper bound on pages followed by one drain.
pub const MAX_PAGES: u32 = 10_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("requested page {requested} but the server answered with page {returned}")]
    PageMismatch { requested: u32, returned: u32 },
    #[error("gave up after {max_pages} pages")]
    PageLimit { max_pages: u32 },
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            current_page: 1,
            total_pages: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub pagination: Pagination,
}

/// One page of a list endpoint. A response without `meta` counts as the
/// last page.
#[derive(Debug, Clone, Deserialize)]
pub struct PageEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub meta: Option<PageMeta>,
}

impl<T> PageEnvelope<T> {
    fn pagination(&self) -> Pagination {
        self.meta.as_ref().map(|m| m.pagination).unwrap_or_default()
    }

    /// Page to request after this one, if any.
    pub fn next_page(&self) -> Option<u32> {
        let Pagination {
            current_page,
            total_pages,
        } = self.pagination();
        (total_pages > current_page).then(|| current_page + 1)
    }
}

/// Envelope of single-entity endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

/// Fetches page 1 and keeps following `pagination` until the last page,
/// returning every item in page order.
///
/// The first failing page aborts the drain; items from earlier pages are
/// dropped with it. So does a page whose `current_page` is not the one
/// requested, and a listing longer than [`MAX_PAGES`].
pub async fn drain<T, E, F, Fut>(mut fetch_page: F) -> Result<Vec<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<PageEnvelope<T>, E>>,
    E: From<PaginationError>,
{
    let mut items = Vec::new();
    let mut page = 1;

    loop {
        let envelope = fetch_page(page).await?;
        let pagination = envelope.pagination();
        if envelope.meta.is_some() && pagination.current_page != page {
            return Err(PaginationError::PageMismatch {
                requested: page,
                returned: pagination.current_page,
            }
            .into());
        }

        let next = envelope.next_page();
        tracing::debug!(
            page,
            total_pages = pagination.total_pages,
            items = envelope.data.len(),
            "fetched page"
        );
        items.extend(envelope.data);

        match next {
            Some(n) if n > MAX_PAGES => {
                return Err(PaginationError::PageLimit {
                    max_pages: MAX_PAGES,
                }
                .into());
            }
            Some(n) => page = n,
            None => break,
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn page(values: Vec<u32>, current_page: u32, total_pages: u32) -> PageEnvelope<u32> {
        PageEnvelope {
            data: values,
            meta: Some(PageMeta {
                pagination: Pagination {
                    current_page,
                    total_pages,
                },
            }),
        }
    }

    #[tokio::test]
    async fn drains_every_page_in_order() {
        let sizes = [3usize, 0, 2, 4];
        let total = sizes.len() as u32;
        let requested = RefCell::new(Vec::new());

        let items = drain(|n| {
            requested.borrow_mut().push(n);
            let start: usize = sizes[..(n as usize - 1)].iter().sum();
            let values = (start..start + sizes[n as usize - 1])
                .map(|v| v as u32)
                .collect();
            async move { Ok::<_, anyhow::Error>(page(values, n, total)) }
        })
        .await
        .unwrap();

        assert_eq!(items.len(), sizes.iter().sum::<usize>());
        assert_eq!(items, (0..9).collect::<Vec<u32>>());
        assert_eq!(*requested.borrow(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn single_page_issues_one_request() {
        let calls = RefCell::new(0);
        let items = drain(|n| {
            *calls.borrow_mut() += 1;
            async move { Ok::<_, anyhow::Error>(page(vec![42], n, 1)) }
        })
        .await
        .unwrap();

        assert_eq!(items, vec![42]);
        assert_eq!(*calls.borrow(), 1);
    }

    #[tokio::test]
    async fn empty_first_page_is_not_an_error() {
        let items = drain(|n| async move { Ok::<_, anyhow::Error>(page(Vec::new(), n, 1)) })
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn failing_page_aborts_the_drain() {
        let err = drain(|n| async move {
            if n == 2 {
                Err(anyhow::anyhow!("status 500"))
            } else {
                Ok(page(vec![n], n, 3))
            }
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "status 500");
    }

    #[tokio::test]
    async fn stuck_page_number_aborts_the_drain() {
        let calls = RefCell::new(0);
        let err = drain(|_| {
            *calls.borrow_mut() += 1;
            // Ignores the requested page and always answers with page 1 of 2.
            async move { Ok::<_, anyhow::Error>(page(vec![1], 1, 2)) }
        })
        .await
        .unwrap_err();

        assert_eq!(
            err.downcast_ref::<PaginationError>(),
            Some(&PaginationError::PageMismatch {
                requested: 2,
                returned: 1
            })
        );
        assert_eq!(*calls.borrow(), 2);
    }

    #[tokio::test]
    async fn endless_listing_stops_at_page_limit() {
        let err = drain(|n| async move { Ok::<_, anyhow::Error>(page(Vec::new(), n, u32::MAX)) })
            .await
            .unwrap_err();

        assert_eq!(
            err.downcast_ref::<PaginationError>(),
            Some(&PaginationError::PageLimit {
                max_pages: MAX_PAGES
            })
        );
    }

    #[tokio::test]
    async fn missing_meta_ends_the_drain_on_any_page() {
        let items = drain(|n| async move {
            let mut envelope = page(vec![n], n, 2);
            if n == 2 {
                envelope.meta = None;
            }
            Ok::<_, anyhow::Error>(envelope)
        })
        .await
        .unwrap();
        assert_eq!(items, vec![1, 2]);
    }

    #[test]
    fn missing_meta_is_the_last_page() {
        let envelope: PageEnvelope<u32> = serde_json::from_str(r#"{"data": [1, 2]}"#).unwrap();
        assert_eq!(envelope.next_page(), None);

        let envelope: PageEnvelope<u32> = serde_json::from_str(
            r#"{"data": [], "meta": {"pagination": {"current_page": 1, "total_pages": 3, "count": 0}}}"#,
        )
        .unwrap();
        assert_eq!(envelope.next_page(), Some(2));
    }
}
