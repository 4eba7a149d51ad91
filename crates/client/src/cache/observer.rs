//! Active query subscriptions.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::{CacheEvent, Cached, QueryCache, QueryKey, QueryOptions};
use crate::api::ApiError;

pub(super) type TypedFetcher<T> =
    Arc<dyn Fn() -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

/// A mounted view's subscription to one query.
///
/// While alive, the query is refetched whenever it is invalidated and, if a
/// refetch interval was requested, polled in the background. Dropping the
/// observer stops both.
pub struct QueryObserver<T: Cached> {
    id: u64,
    key: QueryKey,
    options: QueryOptions,
    cache: QueryCache,
    fetcher: TypedFetcher<T>,
    poll: Option<JoinHandle<()>>,
}

impl<T: Cached> QueryObserver<T> {
    pub(super) fn new(
        id: u64,
        key: QueryKey,
        options: QueryOptions,
        cache: QueryCache,
        fetcher: TypedFetcher<T>,
        poll: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            id,
            key,
            options,
            cache,
            fetcher,
            poll,
        }
    }

    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Fresh cached value, fetching if needed.
    ///
    /// # Errors
    ///
    /// Returns the fetch error when the entry was stale or missing.
    pub async fn read(&self) -> Result<Arc<T>, ApiError> {
        let fetcher = Arc::clone(&self.fetcher);
        self.cache
            .read(&self.key, self.options, move || fetcher())
            .await
    }

    /// Whatever is cached right now, without fetching.
    pub async fn current(&self) -> Option<Arc<T>> {
        self.cache.get(&self.key).await
    }

    /// Change events for this observer's key.
    #[must_use]
    pub fn subscribe(&self) -> ObserverEvents {
        ObserverEvents {
            key: self.key.clone(),
            rx: self.cache.subscribe(),
        }
    }
}

impl<T: Cached> Drop for QueryObserver<T> {
    fn drop(&mut self) {
        if let Some(poll) = self.poll.take() {
            poll.abort();
        }
        self.cache.unregister(self.id);
    }
}

impl<T: Cached> std::fmt::Debug for QueryObserver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryObserver")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("polling", &self.poll.is_some())
            .finish_non_exhaustive()
    }
}

/// Cache events filtered to one key.
pub struct ObserverEvents {
    key: QueryKey,
    rx: broadcast::Receiver<CacheEvent>,
}

impl ObserverEvents {
    /// Wait for the next event on this key. Returns `None` once the cache is
    /// gone.
    pub async fn next(&mut self) -> Option<CacheEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.key() == &self.key => return Some(event),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
