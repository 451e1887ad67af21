//! Per-key TTL cache with single-flight refresh.
//!
//! Each key owns a slot holding its last good entry and, while a refresh is in
//! flight, the shared future every caller for that key awaits. The refresh runs
//! as a spawned task: it installs its result and clears the pending marker
//! before any waiter observes the settlement, and dropping a waiter never
//! cancels it. A refresh task that is dropped before it settles, for example
//! because its runtime shut down, clears the marker as well, so the next call
//! starts a new fetch.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::time::Instant;
use tollgate_core::Emptiness;
use tollgate_types::{CacheConfig, TollgateError};

type SharedRefresh<V> = Shared<BoxFuture<'static, Result<V, TollgateError>>>;

/// Upper bound used when `now + ttl` does not fit in an `Instant`.
const FOREVER: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

struct Entry<V> {
    value: V,
    fetched_at: DateTime<Utc>,
    expires_at: Instant,
}

struct Pending<V> {
    id: u64,
    refresh: SharedRefresh<V>,
}

struct Slot<V> {
    entry: Option<Entry<V>>,
    pending: Option<Pending<V>>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            entry: None,
            pending: None,
        }
    }
}

struct Inner<K, V> {
    config: CacheConfig,
    slots: Mutex<HashMap<K, Slot<V>>>,
    next_refresh: AtomicU64,
}

impl<K, V> Inner<K, V> {
    fn lock(&self) -> MutexGuard<'_, HashMap<K, Slot<V>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A cached value as seen by [`TtlCache::peek`].
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSnapshot<V> {
    /// The last successfully fetched non-empty value.
    pub value: V,
    /// Wall-clock time at which `value` was fetched.
    pub fetched_at: DateTime<Utc>,
    /// Whether the entry is still within its TTL.
    pub is_fresh: bool,
}

/// TTL cache whose concurrent misses for one key share a single fetch.
///
/// Cloning is cheap and yields a handle to the same cache.
pub struct TtlCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl<K, V> TtlCache<K, V> {
    /// Create an empty cache.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                slots: Mutex::new(HashMap::new()),
                next_refresh: AtomicU64::new(0),
            }),
        }
    }

    /// The configuration this cache was built with.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Number of keys currently holding an entry, fresh or stale.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .values()
            .filter(|s| s.entry.is_some())
            .count()
    }

    /// True if no key holds an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. In-flight refreshes keep running and install their
    /// results when they settle.
    pub fn clear(&self) {
        let mut slots = self.inner.lock();
        slots.retain(|_, slot| {
            slot.entry = None;
            slot.pending.is_some()
        });
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Emptiness + Send + Sync + 'static,
{
    /// Return the cached value for `key`, refreshing it through `fetch` when it is
    /// missing, expired, or `force_refresh` is set.
    ///
    /// Concurrent callers that find the key stale share one invocation of
    /// `fetch` and observe the same result. A `force_refresh` call that finds a
    /// refresh already in flight joins it instead of starting another.
    ///
    /// On settlement:
    /// - a non-empty value replaces the entry and resets its TTL;
    /// - an empty value (see [`Emptiness`]) is returned to the waiters but leaves
    ///   the previous entry in place;
    /// - an error is returned to the waiters and leaves the previous entry in
    ///   place, unless `serve_stale_on_error` is set and an entry exists, in
    ///   which case the waiters receive that entry's value.
    ///
    /// `fetch` is called while the cache's key map is locked and must not touch
    /// this cache synchronously; the future it returns may.
    ///
    /// # Errors
    /// The error produced by the refresh, unchanged. A panicking refresh yields
    /// `GatewayError.InternalError`.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "tollgate::middleware::cache::get_or_refresh",
            skip_all,
            fields(ttl_ms = ttl.as_millis() as u64, force_refresh = force_refresh),
        )
    )]
    pub async fn get_or_refresh<F, Fut>(
        &self,
        key: K,
        ttl: Duration,
        fetch: F,
        force_refresh: bool,
    ) -> Result<V, TollgateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, TollgateError>> + Send + 'static,
    {
        let pending = {
            let mut slots = self.inner.lock();
            let slot = slots.entry(key.clone()).or_default();
            if !force_refresh {
                let fresh = slot
                    .entry
                    .as_ref()
                    .filter(|e| Instant::now() < e.expires_at);
                if let Some(entry) = fresh {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("cache hit");
                    return Ok(entry.value.clone());
                }
            }
            if let Some(pending) = &slot.pending {
                #[cfg(feature = "tracing")]
                tracing::debug!("joining in-flight refresh");
                pending.refresh.clone()
            } else {
                #[cfg(feature = "tracing")]
                tracing::debug!("starting refresh");
                let pending = self.spawn_refresh(key, ttl, fetch());
                let refresh = pending.refresh.clone();
                slot.pending = Some(pending);
                refresh
            }
        };
        pending.await
    }

    /// [`get_or_refresh`](Self::get_or_refresh) with the configured default TTL.
    ///
    /// # Errors
    /// See [`get_or_refresh`](Self::get_or_refresh).
    pub async fn get<F, Fut>(&self, key: K, fetch: F) -> Result<V, TollgateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, TollgateError>> + Send + 'static,
    {
        let ttl = self.inner.config.default_ttl;
        self.get_or_refresh(key, ttl, fetch, false).await
    }

    /// The current entry for `key`, fresh or stale, without refreshing it.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<CacheSnapshot<V>> {
        let slots = self.inner.lock();
        let entry = slots.get(key)?.entry.as_ref()?;
        Some(CacheSnapshot {
            value: entry.value.clone(),
            fetched_at: entry.fetched_at,
            is_fresh: Instant::now() < entry.expires_at,
        })
    }

    /// Drop the entry for `key`. Returns whether an entry was removed.
    ///
    /// A refresh in flight for `key` is not cancelled; its waiters stay
    /// coalesced and its result is installed when it settles.
    pub fn evict(&self, key: &K) -> bool {
        let mut slots = self.inner.lock();
        let Some(slot) = slots.get_mut(key) else {
            return false;
        };
        let removed = slot.entry.take().is_some();
        if slot.pending.is_none() {
            slots.remove(key);
        }
        removed
    }

    /// True while a refresh for `key` is in flight.
    #[must_use]
    pub fn is_refreshing(&self, key: &K) -> bool {
        self.inner
            .lock()
            .get(key)
            .is_some_and(|s| s.pending.is_some())
    }

    /// Spawn the refresh task. Called with the slot map locked, so nothing
    /// here may lock it; a task dropped before its first poll is cleaned up by
    /// whichever waiter sees the `JoinError`.
    fn spawn_refresh<Fut>(&self, key: K, ttl: Duration, fut: Fut) -> Pending<V>
    where
        Fut: Future<Output = Result<V, TollgateError>> + Send + 'static,
    {
        let id = self.inner.next_refresh.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let guard = PendingGuard {
                inner,
                key: Some(task_key),
                id,
            };
            let outcome = AssertUnwindSafe(fut)
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(TollgateError::internal("cache refresh panicked")));
            guard.settle(ttl, outcome)
        });

        let inner = Arc::downgrade(&self.inner);
        let refresh = async move {
            match handle.await {
                Ok(result) => result,
                Err(err) => {
                    if let Some(inner) = Weak::upgrade(&inner) {
                        clear_pending(&inner, &key, id);
                    }
                    Err(TollgateError::internal(err))
                }
            }
        }
        .boxed()
        .shared();
        Pending { id, refresh }
    }
}

/// Owned by a running refresh task. Settling disarms it; dropping it armed
/// means the task was cancelled, and the pending marker is cleared.
struct PendingGuard<K, V>
where
    K: Eq + Hash,
{
    inner: Arc<Inner<K, V>>,
    key: Option<K>,
    id: u64,
}

impl<K, V> PendingGuard<K, V>
where
    K: Eq + Hash,
    V: Clone + Emptiness,
{
    fn settle(
        mut self,
        ttl: Duration,
        outcome: Result<V, TollgateError>,
    ) -> Result<V, TollgateError> {
        match self.key.take() {
            Some(key) => settle(&self.inner, key, ttl, outcome),
            None => outcome,
        }
    }
}

impl<K, V> Drop for PendingGuard<K, V>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            #[cfg(feature = "tracing")]
            tracing::debug!(refresh = self.id, "refresh dropped before settling");
            clear_pending(&self.inner, &key, self.id);
        }
    }
}

/// Clear the pending marker for `key` if it still belongs to refresh `id`.
fn clear_pending<K, V>(inner: &Inner<K, V>, key: &K, id: u64)
where
    K: Eq + Hash,
{
    let mut slots = inner.lock();
    let Some(slot) = slots.get_mut(key) else {
        return;
    };
    if slot.pending.as_ref().is_none_or(|p| p.id != id) {
        return;
    }
    let cleared = slot.pending.take();
    if slot.entry.is_none() {
        slots.remove(key);
    }
    drop(slots);
    drop(cleared);
}

/// Install the outcome of a refresh and clear the pending marker. Runs before
/// any waiter is resumed.
fn settle<K, V>(
    inner: &Inner<K, V>,
    key: K,
    ttl: Duration,
    outcome: Result<V, TollgateError>,
) -> Result<V, TollgateError>
where
    K: Eq + Hash,
    V: Clone + Emptiness,
{
    let mut slots = inner.lock();
    let slot = slots.entry(key).or_default();
    slot.pending = None;
    match outcome {
        Ok(value) => {
            if !value.is_empty_result() {
                let now = Instant::now();
                slot.entry = Some(Entry {
                    value: value.clone(),
                    fetched_at: Utc::now(),
                    expires_at: now.checked_add(ttl).unwrap_or_else(|| now + FOREVER),
                });
            }
            #[cfg(feature = "tracing")]
            if value.is_empty_result() {
                tracing::debug!("refresh returned an empty result; keeping previous entry");
            }
            Ok(value)
        }
        Err(err) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(kind = %err.kind(), error = %err, "cache refresh failed");
            match &slot.entry {
                Some(entry) if inner.config.serve_stale_on_error => Ok(entry.value.clone()),
                _ => Err(err),
            }
        }
    }
}
