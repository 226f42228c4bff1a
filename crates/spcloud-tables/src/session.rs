//! Per-query-session state shared by all table callbacks.

use serde::de::DeserializeOwned;
use spcloud_api::{ApiClient, ApiPath, ListParams, RetryPolicy, User};

use crate::error::{TableError, WithOperation};
use crate::identity::ActorCache;
use crate::lister::{get_optional, list_pages, page_size, Budget};

#[derive(Debug)]
pub struct Session {
    client: ApiClient,
    retry: RetryPolicy,
    actor: ActorCache,
}

impl Session {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
            actor: ActorCache::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// The authenticated user, memoized for the life of the session.
    pub async fn actor(&self) -> Result<&User, TableError> {
        self.actor.get_or_fetch(&self.client, &self.retry).await
    }

    /// Page through `path` into `state`, asking for no more rows than it wants.
    pub async fn list_into<T, S, E>(
        &self,
        operation: &str,
        path: &ApiPath,
        filter: Option<String>,
        state: &mut S,
        emit: E,
    ) -> Result<(), TableError>
    where
        T: DeserializeOwned,
        S: Budget,
        E: FnMut(&mut S, T) -> Result<(), TableError>,
    {
        let limit = page_size(state.remaining());
        let filter = filter.filter(|f| !f.is_empty());
        let client = &self.client;
        list_pages(
            operation,
            &self.retry,
            state,
            |cursor| {
                let params = ListParams {
                    limit: Some(limit),
                    next_token: cursor,
                    where_clause: filter.clone(),
                };
                async move { client.list::<T>(path, &params).await }
            },
            emit,
        )
        .await
    }

    /// Every item behind `path`, across all pages.
    pub async fn list_all<T: DeserializeOwned>(&self, operation: &str, path: &ApiPath) -> Result<Vec<T>, TableError> {
        let mut items = Vec::new();
        self.list_into(operation, path, None, &mut items, |items: &mut Vec<T>, item| {
            items.push(item);
            Ok(())
        })
        .await?;
        Ok(items)
    }

    /// A single resource; 404 yields `None`.
    pub async fn get_optional<T: DeserializeOwned>(&self, operation: &str, path: &ApiPath) -> Result<Option<T>, TableError> {
        get_optional(operation, &self.retry, || self.client.get::<T>(path)).await
    }

    /// A single resource that must exist.
    pub async fn get<T: DeserializeOwned>(&self, operation: &str, path: &ApiPath) -> Result<T, TableError> {
        self.retry
            .run(operation, || self.client.get::<T>(path))
            .await
            .with_operation(operation)
    }
}
