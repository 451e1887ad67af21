use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tollgate_core::{Emptiness, Fetcher};
use tollgate_middleware::{CacheSnapshot, RateLimiter, TtlCache};
use tollgate_types::TollgateError;

/// A fetcher behind a single-flight cache and its upstream's rate limiter.
///
/// Cache hits never touch the limiter. A refresh is queued on the limiter and
/// then calls the fetcher; its outcome is cached per the [`TtlCache`] rules.
pub struct CachedSource<K, V>
where
    K: Send + Sync,
    V: Send,
{
    fetcher: Arc<dyn Fetcher<K, V>>,
    limiter: Arc<RateLimiter>,
    cache: TtlCache<K, V>,
    ttl: Duration,
}

impl<K, V> Clone for CachedSource<K, V>
where
    K: Send + Sync,
    V: Send,
{
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            limiter: Arc::clone(&self.limiter),
            cache: self.cache.clone(),
            ttl: self.ttl,
        }
    }
}

impl<K, V> CachedSource<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Emptiness + Send + Sync + 'static,
{
    /// Compose a source from its parts. The TTL defaults to the cache's
    /// configured default.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn Fetcher<K, V>>,
        limiter: Arc<RateLimiter>,
        cache: TtlCache<K, V>,
    ) -> Self {
        let ttl = cache.config().default_ttl;
        Self {
            fetcher,
            limiter,
            cache,
            ttl,
        }
    }

    /// Override the TTL applied to entries from this source.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Name of the underlying fetcher.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.fetcher.name()
    }

    /// The cache backing this source.
    #[must_use]
    pub const fn cache(&self) -> &TtlCache<K, V> {
        &self.cache
    }

    /// Cached value for `key`, refreshed through the limiter when stale.
    ///
    /// # Errors
    /// The fetcher's classified error when a refresh fails.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "tollgate::source::get",
            skip_all,
            fields(source = self.name())
        )
    )]
    pub async fn get(&self, key: K) -> Result<V, TollgateError> {
        self.cache
            .get_or_refresh(key.clone(), self.ttl, || self.refresher(key), false)
            .await
    }

    /// Refresh `key` now, joining a refresh already in flight.
    ///
    /// # Errors
    /// The fetcher's classified error when the refresh fails.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "tollgate::source::refresh",
            skip_all,
            fields(source = self.name())
        )
    )]
    pub async fn refresh(&self, key: K) -> Result<V, TollgateError> {
        self.cache
            .get_or_refresh(key.clone(), self.ttl, || self.refresher(key), true)
            .await
    }

    /// The cached entry for `key`, without refreshing.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<CacheSnapshot<V>> {
        self.cache.peek(key)
    }

    /// Drop the cached entry for `key`.
    pub fn evict(&self, key: &K) -> bool {
        self.cache.evict(key)
    }

    fn refresher(&self, key: K) -> impl Future<Output = Result<V, TollgateError>> + Send + 'static {
        let fetcher = Arc::clone(&self.fetcher);
        let limiter = Arc::clone(&self.limiter);
        async move { limiter.schedule(|| fetcher.fetch(&key)).await }
    }
}
