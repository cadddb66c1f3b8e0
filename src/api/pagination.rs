//! Page-number pagination for list endpoints
//!
//! Lists render as `{count, next, previous, results}` with `?page=N` (1-based).

use axum::http::Uri;
use serde::Serialize;
use std::future::Future;
use url::form_urlencoded;

use crate::database::{DatabaseError, Listing, PageRequest};
use crate::error::ApiError;

const PAGE_PARAM: &str = "page";

/// One rendered page of a list endpoint
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Same page metadata around a different rendering of the results
    pub fn with_results<U>(self, results: Vec<U>) -> Page<U> {
        Page {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results,
        }
    }
}

/// Requested page resolved against the configured page size
#[derive(Debug, Clone)]
pub struct Paginator {
    /// `None` until `page=last` is resolved against the collection size
    page: Option<i64>,
    page_size: i64,
    path: String,
    query: Vec<(String, String)>,
}

impl Paginator {
    /// Read `page` from the request URI. A page that is not a positive integer
    /// (or `last`) is a 404 like any other page past the end.
    pub fn from_uri(uri: &Uri, page_size: u32) -> Result<Self, ApiError> {
        let query: Vec<(String, String)> = uri
            .query()
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        let page = match query.iter().find(|(k, _)| k == PAGE_PARAM).map(|(_, v)| v.as_str()) {
            None | Some("") => Some(1),
            Some("last") => None,
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if n >= 1 => Some(n),
                _ => return Err(invalid_page()),
            },
        };

        Ok(Self {
            page,
            page_size: i64::from(page_size.max(1)),
            path: uri.path().to_string(),
            query,
        })
    }

    /// Load the requested window through `fetch`. For `page=last` an empty
    /// window is fetched first so the count fixes the final page number.
    pub async fn fetch<T, F, Fut>(&mut self, fetch: F) -> Result<Listing<T>, ApiError>
    where
        F: Fn(PageRequest) -> Fut,
        Fut: Future<Output = Result<Listing<T>, DatabaseError>>,
    {
        let page = match self.page {
            Some(n) => n,
            None => {
                let counted = fetch(PageRequest::new(0, 0)).await?;
                let last = self.num_pages(counted.count);
                self.page = Some(last);
                last
            }
        };
        Ok(fetch(self.window(page)).await?)
    }

    fn window(&self, page: i64) -> PageRequest {
        PageRequest::new(self.page_size, (page - 1).saturating_mul(self.page_size))
    }

    /// Number of pages; an empty collection still has page one
    fn num_pages(&self, count: i64) -> i64 {
        ((count + self.page_size - 1) / self.page_size).max(1)
    }

    /// Wrap a fetched window in page metadata; a page past the end is a 404
    pub fn finish<T>(&self, listing: Listing<T>) -> Result<Page<T>, ApiError> {
        let num_pages = self.num_pages(listing.count);
        let page = self.page.unwrap_or(num_pages);
        if page > num_pages {
            return Err(invalid_page());
        }

        Ok(Page {
            count: listing.count,
            next: (page < num_pages).then(|| self.link(Some(page + 1))),
            previous: (page > 1).then(|| self.link((page > 2).then_some(page - 1))),
            results: listing.rows,
        })
    }

    /// Relative link to `page`, preserving every other query parameter.
    /// `None` drops the page parameter entirely (the first page).
    fn link(&self, page: Option<i64>) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        let mut replaced = false;
        for (k, v) in &self.query {
            if k == PAGE_PARAM {
                if let (Some(p), false) = (page, replaced) {
                    serializer.append_pair(k, &p.to_string());
                    replaced = true;
                }
                continue;
            }
            serializer.append_pair(k, v);
        }
        if let (Some(p), false) = (page, replaced) {
            serializer.append_pair(PAGE_PARAM, &p.to_string());
        }

        let query = serializer.finish();
        if query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, query)
        }
    }
}

fn invalid_page() -> ApiError {
    ApiError::not_found("Invalid page.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn paginator(uri: &str, size: u32) -> Paginator {
        Paginator::from_uri(&uri.parse::<Uri>().unwrap(), size).unwrap()
    }

    fn listing(count: i64, rows: Vec<i64>) -> Listing<i64> {
        Listing { rows, count }
    }

    /// Serves windows of `1..=count`, recording every request made
    async fn fetch_from(p: &mut Paginator, count: i64, seen: &RefCell<Vec<PageRequest>>) -> Listing<i64> {
        p.fetch(|req| {
            seen.borrow_mut().push(req);
            let rows = (1..=count).skip(req.offset as usize).take(req.limit as usize).collect();
            std::future::ready(Ok::<_, DatabaseError>(listing(count, rows)))
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn first_page_links_forward_only() {
        let seen = RefCell::new(Vec::new());
        let mut p = paginator("/finance-model/", 2);
        let rows = fetch_from(&mut p, 5, &seen).await;
        assert_eq!(seen.borrow().as_slice(), &[PageRequest::new(2, 0)]);

        let page = p.finish(rows).unwrap();
        assert_eq!(page.count, 5);
        assert_eq!(page.results, vec![1, 2]);
        assert_eq!(page.next.as_deref(), Some("/finance-model/?page=2"));
        assert!(page.previous.is_none());
    }

    #[tokio::test]
    async fn middle_page_keeps_other_params() {
        let seen = RefCell::new(Vec::new());
        let mut p = paginator("/line-item/?model_id=3&page=2", 2);
        let rows = fetch_from(&mut p, 5, &seen).await;
        assert_eq!(seen.borrow().as_slice(), &[PageRequest::new(2, 2)]);

        let page = p.finish(rows).unwrap();
        assert_eq!(page.next.as_deref(), Some("/line-item/?model_id=3&page=3"));
        assert_eq!(page.previous.as_deref(), Some("/line-item/?model_id=3"));
    }

    #[test]
    fn empty_collection_has_a_first_page() {
        let page = paginator("/period/", 10).finish(listing(0, vec![])).unwrap();
        assert_eq!(page.count, 0);
        assert!(page.next.is_none());
        assert!(page.results.is_empty());
    }

    #[test]
    fn page_past_the_end_is_not_found() {
        let err = paginator("/period/?page=3", 10).finish(listing(11, vec![])).unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.message(), "Invalid page.");
    }

    #[test]
    fn garbage_page_is_not_found() {
        for bad in ["/period/?page=0", "/period/?page=abc", "/period/?page=-1"] {
            let err = Paginator::from_uri(&bad.parse::<Uri>().unwrap(), 10).unwrap_err();
            assert_eq!(err.status_code(), 404);
        }
    }

    #[tokio::test]
    async fn last_counts_then_loads_only_the_final_window() {
        let seen = RefCell::new(Vec::new());
        let mut p = paginator("/period/?page=last", 2);
        let rows = fetch_from(&mut p, 5, &seen).await;
        assert_eq!(
            seen.borrow().as_slice(),
            &[PageRequest::new(0, 0), PageRequest::new(2, 4)]
        );

        let page = p.finish(rows).unwrap();
        assert_eq!(page.results, vec![5]);
        assert!(page.next.is_none());
        assert_eq!(page.previous.as_deref(), Some("/period/?page=2"));
    }

    #[tokio::test]
    async fn last_of_an_empty_collection_is_page_one() {
        let seen = RefCell::new(Vec::new());
        let mut p = paginator("/period/?page=last", 10);
        let rows = fetch_from(&mut p, 0, &seen).await;
        let page = p.finish(rows).unwrap();
        assert_eq!(page.count, 0);
        assert!(page.previous.is_none());
    }

    #[test]
    fn page_serializes_without_row_bounds_on_the_struct() {
        let page = paginator("/period/", 10).finish(listing(1, vec![7])).unwrap();
        let json = serde_json::to_value(page.with_results(vec!["seven"])).unwrap();
        assert_eq!(json["results"][0], "seven");
        assert_eq!(json["count"], 1);
    }
}
