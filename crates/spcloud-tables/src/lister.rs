//! Cursor pagination driver shared by every list callback.

use std::future::Future;

use spcloud_api::{ApiError, Page, RetryPolicy};
use tracing::debug;

use crate::error::{TableError, WithOperation};

/// Largest page the API serves.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Per-request `limit`: `min(100, remaining)`, never below 1.
pub fn page_size(remaining: Option<u64>) -> u32 {
    match remaining {
        Some(n) => n.clamp(1, MAX_PAGE_SIZE as u64) as u32,
        None => MAX_PAGE_SIZE,
    }
}

/// Anything that can tell the lister to stop early.
pub trait Budget {
    fn is_exhausted(&self) -> bool;

    fn remaining(&self) -> Option<u64> {
        None
    }
}

/// Rows the consumer still wants. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowBudget {
    remaining: Option<u64>,
}

impl RowBudget {
    pub fn unlimited() -> Self {
        Self { remaining: None }
    }

    pub fn limited(n: u64) -> Self {
        Self { remaining: Some(n) }
    }

    pub fn from_limit(limit: Option<u64>) -> Self {
        Self { remaining: limit }
    }

    pub fn consume(&mut self) {
        if let Some(n) = self.remaining.as_mut() {
            *n = n.saturating_sub(1);
        }
    }
}

impl Budget for RowBudget {
    fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    fn remaining(&self) -> Option<u64> {
        self.remaining
    }
}

/// Collecting every item of a parent listing never stops early.
impl<T> Budget for Vec<T> {
    fn is_exhausted(&self) -> bool {
        false
    }
}

/// Drive `fetch` through every page, handing items to `emit`.
///
/// The budget is checked before the first request and after every item, so
/// no further request is issued once it reaches zero. 429 responses are
/// retried per `retry`; any other failure aborts with `operation` attached.
/// An empty page that still carries a cursor does not end the listing.
pub async fn list_pages<T, S, F, Fut, E>(
    operation: &str,
    retry: &RetryPolicy,
    state: &mut S,
    mut fetch: F,
    mut emit: E,
) -> Result<(), TableError>
where
    S: Budget + ?Sized,
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
    E: FnMut(&mut S, T) -> Result<(), TableError>,
{
    if state.is_exhausted() {
        return Ok(());
    }

    let mut cursor: Option<String> = None;
    let mut pages = 0usize;
    loop {
        let page = retry
            .run(operation, || fetch(cursor.clone()))
            .await
            .with_operation(operation)?;
        pages += 1;

        let next = page.next_cursor().map(str::to_string);
        debug!(
            "{}: page {} with {} item(s), more={}",
            operation,
            pages,
            page.items.len(),
            next.is_some()
        );

        for item in page.items {
            emit(&mut *state, item)?;
            if state.is_exhausted() {
                return Ok(());
            }
        }

        match next {
            Some(token) => cursor = Some(token),
            None => return Ok(()),
        }
    }
}

/// Fetch a single resource, treating 404 as "no row".
pub async fn get_optional<T, F, Fut>(
    operation: &str,
    retry: &RetryPolicy,
    fetch: F,
) -> Result<Option<T>, TableError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    match retry.run(operation, fetch).await {
        Ok(item) => Ok(Some(item)),
        Err(ApiError::NotFound(path)) => {
            debug!("{}: {} not found", operation, path);
            Ok(None)
        }
        Err(source) => Err(TableError::Api {
            operation: operation.to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// A fake endpoint: cursor -> (items, next cursor).
    #[derive(Clone)]
    struct FakePages {
        pages: HashMap<Option<String>, (Vec<u32>, Option<String>)>,
        calls: Arc<Mutex<Vec<Option<String>>>>,
    }

    impl FakePages {
        fn new(pages: Vec<(Option<&str>, Vec<u32>, Option<&str>)>) -> Self {
            Self {
                pages: pages
                    .into_iter()
                    .map(|(c, items, next)| {
                        (c.map(str::to_string), (items, next.map(str::to_string)))
                    })
                    .collect(),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn fetch(&self, cursor: Option<String>) -> impl Future<Output = Result<Page<u32>, ApiError>> {
            self.calls.lock().unwrap().push(cursor.clone());
            let (items, next_token) = self.pages.get(&cursor).cloned().unwrap_or_default();
            async move { Ok(Page { items, next_token }) }
        }

        fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    async fn drain(fake: &FakePages, budget: RowBudget) -> (Vec<u32>, Result<(), TableError>) {
        let mut budget = budget;
        let mut seen = Vec::new();
        let result = list_pages(
            "test",
            &RetryPolicy::immediate(),
            &mut budget,
            |cursor| fake.fetch(cursor),
            |b: &mut RowBudget, item| {
                seen.push(item);
                b.consume();
                Ok(())
            },
        )
        .await;
        (seen, result)
    }

    fn three_pages() -> FakePages {
        FakePages::new(vec![
            (None, vec![1, 2], Some("a")),
            (Some("a"), vec![3, 4], Some("b")),
            (Some("b"), vec![5], None),
        ])
    }

    #[test]
    fn test_page_size() {
        assert_eq!(page_size(None), 100);
        assert_eq!(page_size(Some(5)), 5);
        assert_eq!(page_size(Some(500)), 100);
        assert_eq!(page_size(Some(0)), 1);
    }

    #[tokio::test]
    async fn test_follows_cursor_until_nil() {
        let fake = three_pages();
        let (seen, result) = drain(&fake, RowBudget::unlimited()).await;
        result.unwrap();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(fake.calls(), 3);
    }

    #[tokio::test]
    async fn test_budget_stops_mid_page_without_more_requests() {
        for n in 0..=6u64 {
            let fake = three_pages();
            let (seen, result) = drain(&fake, RowBudget::limited(n)).await;
            result.unwrap();
            assert_eq!(seen.len() as u64, n.min(5), "budget {}", n);
            let expected_calls = match n {
                0 => 0,
                1 | 2 => 1,
                3 | 4 => 2,
                _ => 3,
            };
            assert_eq!(fake.calls(), expected_calls, "budget {}", n);
        }
    }

    #[tokio::test]
    async fn test_empty_page_with_cursor_continues() {
        let fake = FakePages::new(vec![
            (None, vec![], Some("a")),
            (Some("a"), vec![], Some("b")),
            (Some("b"), vec![7], Some("")),
        ]);
        let (seen, result) = drain(&fake, RowBudget::unlimited()).await;
        result.unwrap();
        assert_eq!(seen, vec![7]);
        assert_eq!(fake.calls(), 3);
    }

    #[tokio::test]
    async fn test_emit_error_aborts() {
        let fake = three_pages();
        let mut budget = RowBudget::unlimited();
        let err = list_pages(
            "test",
            &RetryPolicy::immediate(),
            &mut budget,
            |cursor| fake.fetch(cursor),
            |_: &mut RowBudget, item: u32| {
                if item == 3 {
                    Err(TableError::invalid_qual("x", "boom"))
                } else {
                    Ok(())
                }
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TableError::InvalidQual { .. }));
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test]
    async fn test_rate_limited_page_is_retried() {
        let attempts = Arc::new(Mutex::new(0u32));
        let mut collected: Vec<u32> = Vec::new();
        list_pages(
            "test",
            &RetryPolicy::immediate(),
            &mut collected,
            |_cursor| {
                let attempts = Arc::clone(&attempts);
                async move {
                    let mut n = attempts.lock().unwrap();
                    *n += 1;
                    if *n < 3 {
                        Err(ApiError::RateLimited {
                            attempts: 1,
                            message: "slow down".into(),
                        })
                    } else {
                        Ok(Page {
                            items: vec![9],
                            next_token: None,
                        })
                    }
                }
            },
            |items: &mut Vec<u32>, item| {
                items.push(item);
                Ok(())
            },
        )
        .await
        .unwrap();
        assert_eq!(collected, vec![9]);
        assert_eq!(*attempts.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_carries_operation() {
        let mut budget = RowBudget::unlimited();
        let err = list_pages(
            "listWorkspaceSnapshots",
            &RetryPolicy::immediate(),
            &mut budget,
            |_cursor| async {
                Err::<Page<u32>, _>(ApiError::Status {
                    status: 403,
                    message: "forbidden".into(),
                })
            },
            |_: &mut RowBudget, _item: u32| Ok(()),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().starts_with("listWorkspaceSnapshots: "));
    }

    #[tokio::test]
    async fn test_get_optional_maps_not_found() {
        let found = get_optional("getToken", &RetryPolicy::immediate(), || async {
            Err::<u32, _>(ApiError::NotFound("user/alice/token/x".into()))
        })
        .await
        .unwrap();
        assert_eq!(found, None);

        let found = get_optional("getToken", &RetryPolicy::immediate(), || async {
            Ok::<u32, ApiError>(4)
        })
        .await
        .unwrap();
        assert_eq!(found, Some(4));

        let err = get_optional("getToken", &RetryPolicy::immediate(), || async {
            Err::<u32, _>(ApiError::Status {
                status: 500,
                message: "boom".into(),
            })
        })
        .await
        .unwrap_err();
        assert!(matches!(err, TableError::Api { .. }));
    }
}
