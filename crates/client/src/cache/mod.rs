//! Query cache shared by every view.
//!
//! # Architecture
//!
//! - One entry per [`QueryKey`] in a `moka` cache (capacity + idle eviction)
//! - `read` serves fresh entries and fetches stale or missing ones
//! - `write` replaces an entry's value without a request (optimistic patch)
//! - `invalidate` marks a key and its children stale, then refetches every
//!   active [`QueryObserver`] under it
//! - Changes are published on a broadcast channel; sending with no
//!   subscribers is not an error
//!
//! Every fetch takes a sequence number when it starts. A result older than
//! the stored one is dropped, and a result that started before the latest
//! invalidation of its key is stored but stays stale. Invalidation records
//! are kept only while a fetch older than them is still running.
//!
//! [`QueryCache::refetch`] is the rollback path: it refetches every entry
//! under a prefix immediately, using the observer's fetcher or the
//! [`Resolver`], and drops entries that cannot be refetched.

mod key;
mod observer;
mod value;

pub use key::{KeyPart, QueryKey};
pub use observer::{ObserverEvents, QueryObserver};
pub use value::{CacheValue, Cached};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::{Future, ready};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::config::ClientConfig;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Type-erased fetcher kept by active observers.
pub type Fetcher =
    Arc<dyn Fn() -> BoxFuture<'static, Result<CacheValue, ApiError>> + Send + Sync>;

/// Builds a fetcher for a key, if the key is one the owner knows how to load.
pub type Resolver = Arc<dyn Fn(&QueryKey) -> Option<Fetcher> + Send + Sync>;

/// Erase a typed fetcher.
pub fn erase<T, F, Fut>(fetcher: F) -> Fetcher
where
    T: Cached,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
    Arc::new(move || {
        let fut = fetcher();
        async move { fut.await.map(|v| T::into_value(Arc::new(v))) }.boxed()
    })
}

/// Per-query read options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// How long a fetched value is served without refetching.
    pub stale_time: Duration,
    /// Poll period for observers; `None` disables polling.
    pub refetch_interval: Option<Duration>,
}

impl QueryOptions {
    #[must_use]
    pub const fn new(stale_time: Duration) -> Self {
        Self {
            stale_time,
            refetch_interval: None,
        }
    }

    #[must_use]
    pub const fn with_refetch_interval(mut self, period: Duration) -> Self {
        self.refetch_interval = Some(period);
        self
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

/// Published whenever an entry changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// New value stored by a fetch or a write.
    Updated(QueryKey),
    Invalidated(QueryKey),
    Removed(QueryKey),
}

impl CacheEvent {
    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        match self {
            Self::Updated(key) | Self::Invalidated(key) | Self::Removed(key) => key,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CacheValue,
    fetched_at: Instant,
    stale: bool,
    /// Sequence number of the fetch that produced the value.
    seq: u64,
}

impl CacheEntry {
    fn is_fresh(&self, stale_time: Duration) -> bool {
        !self.stale && self.fetched_at.elapsed() < stale_time
    }
}

struct ActiveQuery {
    key: QueryKey,
    fetcher: Fetcher,
}

// =============================================================================
// QueryCache
// =============================================================================

/// Shared query cache.
///
/// Cheap to clone; clones share entries, observers and the event channel.
/// Create one per console session (or per test).
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<QueryCacheInner>,
}

struct QueryCacheInner {
    entries: Cache<QueryKey, CacheEntry>,
    events: broadcast::Sender<CacheEvent>,
    seq: AtomicU64,
    /// Latest invalidation sequence number per invalidated prefix, pruned
    /// once no running fetch predates it.
    invalidations: Mutex<HashMap<QueryKey, u64>>,
    /// Sequence numbers of fetches that have started but not stored.
    in_flight: Mutex<BTreeSet<u64>>,
    resolver: OnceLock<Resolver>,
    observers: Mutex<HashMap<u64, ActiveQuery>>,
    next_observer: AtomicU64,
    options: QueryOptions,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.inner.entries.entry_count())
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl QueryCache {
    /// Create a cache sized from the client configuration.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_settings(
            config.cache_capacity,
            config.cache_idle,
            QueryOptions::new(config.stale_time),
        )
    }

    #[must_use]
    pub fn with_settings(capacity: u64, idle: Duration, options: QueryOptions) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity)
            .time_to_idle(idle)
            .build();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(QueryCacheInner {
                entries,
                events,
                seq: AtomicU64::new(1),
                invalidations: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(BTreeSet::new()),
                resolver: OnceLock::new(),
                observers: Mutex::new(HashMap::new()),
                next_observer: AtomicU64::new(1),
                options,
            }),
        }
    }

    /// Install the fallback used by [`QueryCache::refetch`] for keys no
    /// observer is watching. Only the first call has an effect.
    pub fn set_resolver(&self, resolver: Resolver) {
        if self.inner.resolver.set(resolver).is_err() {
            warn!("Query cache resolver already set");
        }
    }

    /// Default options for queries that do not set their own.
    #[must_use]
    pub fn options(&self) -> QueryOptions {
        self.inner.options
    }

    /// Subscribe to change events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }

    /// The cached value, fresh or not.
    pub async fn get<T: Cached>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let entry = self.inner.entries.get(key).await?;
        T::from_value(&entry.value)
    }

    /// Whether the next read of `key` will fetch. Missing keys are stale.
    pub async fn is_stale(&self, key: &QueryKey) -> bool {
        match self.inner.entries.get(key).await {
            Some(entry) => !entry.is_fresh(self.inner.options.stale_time),
            None => true,
        }
    }

    /// All cached keys under `prefix`.
    #[must_use]
    pub fn keys_under(&self, prefix: &QueryKey) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self
            .inner
            .entries
            .iter()
            .filter(|(key, _)| prefix.is_prefix_of(key))
            .map(|(key, _)| QueryKey::clone(&key))
            .collect();
        keys.sort();
        keys
    }

    /// Return the cached value if fresh, otherwise fetch and store it.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error; the cached entry is left as it was.
    pub async fn read<T, F, Fut>(
        &self,
        key: &QueryKey,
        options: QueryOptions,
        fetcher: F,
    ) -> Result<Arc<T>, ApiError>
    where
        T: Cached,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, ApiError>> + Send,
    {
        if let Some(value) = self.fresh(key, options.stale_time).await {
            debug!(key = %key, "cache hit");
            return Ok(value);
        }
        debug!(key = %key, "cache miss");
        self.fetch(key, fetcher).await
    }

    /// Fetch unconditionally and store the result.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error; the cached entry is left as it was.
    pub async fn fetch<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> Result<Arc<T>, ApiError>
    where
        T: Cached,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, ApiError>> + Send,
    {
        let ticket = self.begin_fetch();
        let fetched = Arc::new(fetcher().await?);
        let stored = self
            .store(key, T::into_value(Arc::clone(&fetched)), ticket.seq)
            .await;
        Ok(T::from_value(&stored).unwrap_or(fetched))
    }

    /// Store a value as if it had just been fetched.
    pub async fn set<T: Cached>(&self, key: &QueryKey, value: T) {
        let ticket = self.begin_fetch();
        self.store(key, T::into_value(Arc::new(value)), ticket.seq)
            .await;
    }

    /// Replace the value at `key` with `updater(old)`.
    ///
    /// Does nothing (and returns `false`) when the key is not cached or holds
    /// another type. Staleness and fetch order are untouched, so the next
    /// authoritative fetch still wins.
    pub async fn write<T, F>(&self, key: &QueryKey, updater: F) -> bool
    where
        T: Cached,
        F: FnOnce(&T) -> T + Send,
    {
        let result = self
            .inner
            .entries
            .entry(key.clone())
            .and_compute_with(|existing| {
                let op = existing
                    .and_then(|e| {
                        let entry = e.into_value();
                        T::from_value(&entry.value).map(|old| {
                            Op::Put(CacheEntry {
                                value: T::into_value(Arc::new(updater(&old))),
                                ..entry
                            })
                        })
                    })
                    .unwrap_or(Op::Nop);
                ready(op)
            })
            .await;

        let written = matches!(result, CompResult::ReplacedWith(_));
        if written {
            debug!(key = %key, "optimistic write");
            self.emit(CacheEvent::Updated(key.clone()));
        }
        written
    }

    /// Apply `updater` to every cached `T` under `prefix`; returns the keys
    /// that were written.
    pub async fn write_matching<T, F>(&self, prefix: &QueryKey, updater: F) -> Vec<QueryKey>
    where
        T: Cached,
        F: Fn(&T) -> T + Send + Sync,
    {
        let mut written = Vec::new();
        for key in self.keys_under(prefix) {
            if self.write::<T, _>(&key, &updater).await {
                written.push(key);
            }
        }
        written
    }

    /// Mark `prefix` and every key under it stale, then refetch the active
    /// observers under it.
    ///
    /// Refetch failures are logged; the entries stay stale so the next read
    /// tries again.
    pub async fn invalidate(&self, prefix: &QueryKey) {
        self.mark_stale(prefix).await;

        let active = self.active_under(prefix);
        let results = join_all(
            active
                .iter()
                .map(|(key, fetcher)| self.fetch_value(key, fetcher)),
        )
        .await;
        for ((key, _), result) in active.iter().zip(results) {
            if let Err(err) = result {
                warn!(key = %key, error = %err, "Refetch after invalidation failed");
            }
        }
    }

    /// Mark `prefix` stale and refetch every entry under it now, observed or
    /// not.
    ///
    /// Unobserved keys are loaded through the [`Resolver`]. An entry that
    /// has no fetcher, or whose refetch fails, is removed, so a value written
    /// by [`QueryCache::write`] never outlives this call.
    pub async fn refetch(&self, prefix: &QueryKey) {
        self.mark_stale(prefix).await;

        let mut targets: BTreeMap<QueryKey, Option<Fetcher>> = self
            .keys_under(prefix)
            .into_iter()
            .map(|key| (key, None))
            .collect();
        for (key, fetcher) in self.active_under(prefix) {
            targets.insert(key, Some(fetcher));
        }

        let resolver = self.inner.resolver.get();
        join_all(targets.into_iter().map(|(key, fetcher)| {
            let fetcher = fetcher.or_else(|| resolver.and_then(|resolve| resolve(&key)));
            async move { self.refetch_or_remove(&key, fetcher).await }
        }))
        .await;
    }

    async fn refetch_or_remove(&self, key: &QueryKey, fetcher: Option<Fetcher>) {
        let Some(fetcher) = fetcher else {
            debug!(key = %key, "no fetcher, dropping entry");
            self.remove(key).await;
            return;
        };
        if let Err(err) = self.fetch_value(key, &fetcher).await {
            warn!(key = %key, error = %err, "Refetch failed, dropping entry");
            self.remove(key).await;
        }
    }

    async fn mark_stale(&self, prefix: &QueryKey) {
        let seq = self.next_seq();
        lock(&self.inner.invalidations).insert(prefix.clone(), seq);
        self.prune_invalidations();

        for key in self.keys_under(prefix) {
            self.inner
                .entries
                .entry(key.clone())
                .and_compute_with(|existing| {
                    let op = match existing {
                        Some(e) if !e.value().stale => {
                            let mut entry = e.into_value();
                            entry.stale = true;
                            Op::Put(entry)
                        }
                        _ => Op::Nop,
                    };
                    ready(op)
                })
                .await;
            debug!(key = %key, "invalidated");
            self.emit(CacheEvent::Invalidated(key));
        }
    }

    /// Drop an entry entirely.
    pub async fn remove(&self, key: &QueryKey) {
        self.inner.entries.invalidate(key).await;
        self.emit(CacheEvent::Removed(key.clone()));
    }

    /// Keep `key` refreshed for as long as the returned observer lives.
    ///
    /// The fetcher is reused for refetches after invalidation and, when
    /// `options.refetch_interval` is set, for polling. Must be called from
    /// within a Tokio runtime.
    pub fn observe<T, F, Fut>(
        &self,
        key: QueryKey,
        options: QueryOptions,
        fetcher: F,
    ) -> QueryObserver<T>
    where
        T: Cached,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let typed: observer::TypedFetcher<T> = Arc::new(move || fetcher().boxed());
        let erased = erase({
            let typed = Arc::clone(&typed);
            move || typed()
        });

        let id = self.inner.next_observer.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.observers).insert(
            id,
            ActiveQuery {
                key: key.clone(),
                fetcher: Arc::clone(&erased),
            },
        );

        let poll = options
            .refetch_interval
            .map(|period| self.spawn_poll(key.clone(), period, erased));

        QueryObserver::new(id, key, options, self.clone(), typed, poll)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn next_seq(&self) -> u64 {
        self.inner.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Take a sequence number for a fetch; it counts as running until the
    /// ticket is dropped.
    fn begin_fetch(&self) -> FetchTicket<'_> {
        // Registered under the lock so a concurrent prune cannot miss it
        let mut in_flight = lock(&self.inner.in_flight);
        let seq = self.next_seq();
        in_flight.insert(seq);
        drop(in_flight);
        FetchTicket { cache: self, seq }
    }

    /// Forget invalidations that no running fetch started before.
    fn prune_invalidations(&self) {
        let oldest = lock(&self.inner.in_flight).first().copied();
        lock(&self.inner.invalidations)
            .retain(|_, seq| oldest.is_some_and(|oldest| *seq > oldest));
    }

    #[cfg(test)]
    fn invalidation_records(&self) -> usize {
        lock(&self.inner.invalidations).len()
    }

    fn emit(&self, event: CacheEvent) {
        // Err only means nobody is listening.
        let _ = self.inner.events.send(event);
    }

    async fn fresh<T: Cached>(&self, key: &QueryKey, stale_time: Duration) -> Option<Arc<T>> {
        let entry = self.inner.entries.get(key).await?;
        if entry.is_fresh(stale_time) {
            T::from_value(&entry.value)
        } else {
            None
        }
    }

    fn last_invalidation(&self, key: &QueryKey) -> u64 {
        lock(&self.inner.invalidations)
            .iter()
            .filter(|(prefix, _)| prefix.is_prefix_of(key))
            .map(|(_, seq)| *seq)
            .max()
            .unwrap_or(0)
    }

    /// Store a fetch result unless a newer fetch already landed; returns the
    /// value now cached.
    async fn store(&self, key: &QueryKey, value: CacheValue, seq: u64) -> CacheValue {
        let incoming = value.clone();
        let result = self
            .inner
            .entries
            .entry(key.clone())
            .and_compute_with(|existing| {
                let op = match existing {
                    Some(e) if e.value().seq > seq => Op::Nop,
                    // Read under the entry lock: an invalidation either
                    // recorded its seq already or marks this entry after us
                    _ => Op::Put(CacheEntry {
                        value: incoming,
                        fetched_at: Instant::now(),
                        stale: seq < self.last_invalidation(key),
                        seq,
                    }),
                };
                ready(op)
            })
            .await;

        match result {
            CompResult::Inserted(entry) | CompResult::ReplacedWith(entry) => {
                self.emit(CacheEvent::Updated(key.clone()));
                entry.into_value().value
            }
            CompResult::Unchanged(entry) => {
                debug!(key = %key, seq, "discarding out-of-order fetch");
                entry.into_value().value
            }
            CompResult::Removed(_) | CompResult::StillNone(_) => value,
        }
    }

    async fn fetch_value(&self, key: &QueryKey, fetcher: &Fetcher) -> Result<(), ApiError> {
        let ticket = self.begin_fetch();
        let value = fetcher().await?;
        self.store(key, value, ticket.seq).await;
        Ok(())
    }

    /// Active observers under `prefix`, one per key.
    fn active_under(&self, prefix: &QueryKey) -> Vec<(QueryKey, Fetcher)> {
        let observers = lock(&self.inner.observers);
        let mut seen: HashMap<&QueryKey, &Fetcher> = HashMap::new();
        for query in observers.values() {
            if prefix.is_prefix_of(&query.key) {
                seen.entry(&query.key).or_insert(&query.fetcher);
            }
        }
        seen.into_iter()
            .map(|(key, fetcher)| (key.clone(), Arc::clone(fetcher)))
            .collect()
    }

    fn unregister(&self, id: u64) {
        lock(&self.inner.observers).remove(&id);
    }

    fn spawn_poll(
        &self,
        key: QueryKey,
        period: Duration,
        fetcher: Fetcher,
    ) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                debug!(key = %key, "polling");
                if let Err(err) = cache.fetch_value(&key, &fetcher).await {
                    warn!(key = %key, error = %err, "Polling refetch failed");
                }
            }
        })
    }
}

/// A running fetch. Dropping it (stored, failed or cancelled) ends the fetch.
struct FetchTicket<'a> {
    cache: &'a QueryCache,
    seq: u64,
}

impl Drop for FetchTicket<'_> {
    fn drop(&mut self) {
        lock(&self.cache.inner.in_flight).remove(&self.seq);
        self.cache.prune_invalidations();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use moogship_core::{Shipment, ShipmentId, ShipmentStatus};

    use super::*;

    fn cache() -> QueryCache {
        QueryCache::with_settings(100, Duration::from_secs(300), QueryOptions::default())
    }

    fn shipment(id: i64, status: &str) -> Shipment {
        serde_json::from_value(serde_json::json!({
            "id": id, "status": status, "totalPrice": 5000,
            "sender": {"name": "A", "address1": "x", "city": "Istanbul", "postalCode": "34000", "country": "TR"},
            "receiver": {"name": "B", "address1": "y", "city": "Austin", "postalCode": "78701", "country": "US"},
            "createdAt": "2026-03-01T10:00:00Z"
        }))
        .unwrap()
    }

    fn statuses(list: &[Shipment]) -> Vec<ShipmentStatus> {
        list.iter().map(|s| s.status).collect()
    }

    #[tokio::test]
    async fn test_read_serves_fresh_entry() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        let key = QueryKey::my_shipments();

        for _ in 0..3 {
            let list = cache
                .read(&key, cache.options(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![shipment(1, "pending")])
                })
                .await
                .unwrap();
            assert_eq!(list.len(), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_stale_time_always_fetches() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        let key = QueryKey::users();
        let options = QueryOptions::new(Duration::ZERO);

        for _ in 0..2 {
            cache
                .read(&key, options, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Vec::<moogship_core::User>::new())
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_error_keeps_entry() {
        let cache = cache();
        let key = QueryKey::my_shipments();
        cache.set(&key, vec![shipment(1, "pending")]).await;
        cache.invalidate(&key).await;

        let err = cache
            .read::<Vec<Shipment>, _, _>(&key, cache.options(), || async {
                Err(ApiError::RateLimited {
                    retry_after: 3,
                    message: None,
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::RateLimited { retry_after: 3, .. }));
        assert!(cache.get::<Vec<Shipment>>(&key).await.is_some());
        assert!(cache.is_stale(&key).await);
    }

    #[tokio::test]
    async fn test_write_on_missing_key_is_noop() {
        let cache = cache();
        let key = QueryKey::my_shipments();
        let written = cache
            .write::<Vec<Shipment>, _>(&key, |old| old.clone())
            .await;
        assert!(!written);
        assert!(cache.get::<Vec<Shipment>>(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_write_does_not_mutate_previous_value() {
        let cache = cache();
        let key = QueryKey::my_shipments();
        cache.set(&key, vec![shipment(7, "pending")]).await;
        let before = cache.get::<Vec<Shipment>>(&key).await.unwrap();

        cache
            .write::<Vec<Shipment>, _>(&key, |old| {
                old.iter()
                    .map(|s| s.with_status(ShipmentStatus::Cancelled))
                    .collect()
            })
            .await;

        let after = cache.get::<Vec<Shipment>>(&key).await.unwrap();
        assert_eq!(statuses(&before), vec![ShipmentStatus::Pending]);
        assert_eq!(statuses(&after), vec![ShipmentStatus::Cancelled]);
    }

    #[tokio::test]
    async fn test_patch_then_invalidate_converges_to_server() {
        let cache = cache();
        let key = QueryKey::my_shipments();
        cache.set(&key, vec![shipment(7, "pending")]).await;

        cache
            .write::<Vec<Shipment>, _>(&key, |old| {
                old.iter()
                    .map(|s| s.with_status(ShipmentStatus::Cancelled))
                    .collect()
            })
            .await;
        cache.invalidate(&key).await;

        let list = cache
            .read(&key, cache.options(), || async {
                Ok(vec![shipment(7, "approved")])
            })
            .await
            .unwrap();
        assert_eq!(statuses(&list), vec![ShipmentStatus::Approved]);
        assert!(!cache.is_stale(&key).await);
    }

    #[tokio::test]
    async fn test_out_of_order_fetch_is_discarded() {
        let cache = cache();
        let key = QueryKey::my_shipments();
        let older = cache.next_seq();
        let newer = cache.next_seq();

        cache
            .store(
                &key,
                CacheValue::Shipments(Arc::new(vec![shipment(1, "cancelled")])),
                newer,
            )
            .await;
        let kept = cache
            .store(
                &key,
                CacheValue::Shipments(Arc::new(vec![shipment(1, "pending")])),
                older,
            )
            .await;

        let list = Vec::<Shipment>::from_value(&kept).unwrap();
        assert_eq!(statuses(&list), vec![ShipmentStatus::Cancelled]);
        let cached = cache.get::<Vec<Shipment>>(&key).await.unwrap();
        assert_eq!(statuses(&cached), vec![ShipmentStatus::Cancelled]);
    }

    #[tokio::test]
    async fn test_fetch_started_before_invalidation_stays_stale() {
        let cache = cache();
        let key = QueryKey::shipments_page(1, 25);
        let ticket = cache.begin_fetch();
        cache.invalidate(&QueryKey::all_shipments()).await;
        assert_eq!(cache.invalidation_records(), 1);

        cache
            .store(
                &key,
                CacheValue::Shipments(Arc::new(vec![shipment(1, "pending")])),
                ticket.seq,
            )
            .await;
        assert!(cache.is_stale(&key).await);

        drop(ticket);
        assert_eq!(cache.invalidation_records(), 0);
    }

    #[tokio::test]
    async fn test_invalidation_records_do_not_accumulate() {
        let cache = cache();
        for id in 0..100 {
            cache.invalidate(&QueryKey::tracking(ShipmentId::new(id))).await;
        }
        assert_eq!(cache.invalidation_records(), 0);

        let ticket = cache.begin_fetch();
        for id in 0..100 {
            cache.invalidate(&QueryKey::tracking(ShipmentId::new(id))).await;
        }
        assert_eq!(cache.invalidation_records(), 100);
        drop(ticket);
        assert_eq!(cache.invalidation_records(), 0);
    }

    #[tokio::test]
    async fn test_fetch_after_pruned_invalidation_is_fresh() {
        let cache = cache();
        let key = QueryKey::my_shipments();
        cache.invalidate(&key).await;

        cache.set(&key, vec![shipment(1, "pending")]).await;
        assert!(!cache.is_stale(&key).await);
    }

    #[tokio::test]
    async fn test_refetch_without_fetcher_drops_written_value() {
        let cache = cache();
        let key = QueryKey::my_shipments();
        cache.set(&key, vec![shipment(7, "pending")]).await;
        cache
            .write::<Vec<Shipment>, _>(&key, |list| {
                list.iter()
                    .map(|s| s.with_status(ShipmentStatus::Cancelled))
                    .collect()
            })
            .await;

        cache.refetch(&key).await;

        assert!(cache.get::<Vec<Shipment>>(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_refetch_loads_unobserved_key_through_resolver() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        cache.set_resolver(Arc::new({
            let calls = Arc::clone(&calls);
            move |key: &QueryKey| {
                (*key == QueryKey::my_shipments()).then(|| {
                    let calls = Arc::clone(&calls);
                    erase(move || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async { Ok(vec![shipment(7, "pending")]) }
                    })
                })
            }
        }));
        let mine = QueryKey::my_shipments();
        let tracking = QueryKey::tracking(ShipmentId::new(7));
        cache.set(&mine, vec![shipment(7, "cancelled")]).await;
        cache.set(&tracking, shipment(7, "cancelled")).await;

        cache.refetch(&mine).await;
        cache.refetch(&tracking).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let list = cache.get::<Vec<Shipment>>(&mine).await.unwrap();
        assert_eq!(statuses(&list), vec![ShipmentStatus::Pending]);
        assert!(!cache.is_stale(&mine).await);
        assert!(cache.get::<Shipment>(&tracking).await.is_none());
    }

    #[tokio::test]
    async fn test_failed_refetch_drops_entry() {
        let cache = cache();
        cache.set_resolver(Arc::new(|_: &QueryKey| {
            Some(erase(|| async {
                Err::<Vec<Shipment>, _>(ApiError::Status {
                    status: 503,
                    message: "offline".to_owned(),
                })
            }))
        }));
        let key = QueryKey::my_shipments();
        cache.set(&key, vec![shipment(7, "cancelled")]).await;

        cache.refetch(&key).await;

        assert!(cache.get::<Vec<Shipment>>(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_prefix_invalidation_covers_children() {
        let cache = cache();
        let page1 = QueryKey::shipments_page(1, 25);
        let page2 = QueryKey::shipments_page(2, 25);
        let mine = QueryKey::my_shipments();
        for key in [&page1, &page2, &mine] {
            cache.set(key, vec![shipment(1, "pending")]).await;
        }

        cache.invalidate(&QueryKey::all_shipments()).await;

        assert!(cache.is_stale(&page1).await);
        assert!(cache.is_stale(&page2).await);
        assert!(!cache.is_stale(&mine).await);
    }

    #[tokio::test]
    async fn test_write_matching_skips_other_types() {
        let cache = cache();
        cache
            .set(&QueryKey::all_shipments(), vec![shipment(3, "pending")])
            .await;
        cache
            .set(&QueryKey::tracking(ShipmentId::new(3)), shipment(3, "pending"))
            .await;

        let written = cache
            .write_matching::<Vec<Shipment>, _>(&QueryKey::all_shipments(), |old| {
                old.iter()
                    .map(|s| s.with_status(ShipmentStatus::Cancelled))
                    .collect()
            })
            .await;
        assert_eq!(written, vec![QueryKey::all_shipments()]);
    }

    #[tokio::test]
    async fn test_events_published() {
        let cache = cache();
        let key = QueryKey::users();
        // No subscribers yet: must not fail
        cache.set(&key, Vec::<moogship_core::User>::new()).await;

        let mut rx = cache.subscribe();
        cache.invalidate(&key).await;
        assert_eq!(rx.recv().await.unwrap(), CacheEvent::Invalidated(key.clone()));
        cache.remove(&key).await;
        assert_eq!(rx.recv().await.unwrap(), CacheEvent::Removed(key));
    }

    #[tokio::test]
    async fn test_invalidate_refetches_active_observers_only() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::my_shipments();

        let observer = {
            let calls = Arc::clone(&calls);
            cache.observe(key.clone(), cache.options(), move || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![shipment(7, "cancelled")])
                }
            })
        };
        observer.read().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate(&key).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!cache.is_stale(&key).await);

        drop(observer);
        cache.invalidate(&key).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_stale(&key).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_interval_polls_until_dropped() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let options = QueryOptions::default().with_refetch_interval(Duration::from_secs(60));

        let observer = {
            let calls = Arc::clone(&calls);
            cache.observe(
                QueryKey::tracking(ShipmentId::new(7)),
                options,
                move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(shipment(7, "in_transit"))
                    }
                },
            )
        };

        tokio::time::sleep(Duration::from_secs(125)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        drop(observer);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
