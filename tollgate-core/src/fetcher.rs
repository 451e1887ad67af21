use std::sync::Arc;

use async_trait::async_trait;
use tollgate_types::TollgateError;

/// A client that talks to one upstream endpoint.
///
/// Implementations classify every failure at this layer, including their own
/// timeouts (`*.NetworkError.RequestTimeout`). Layers above never reclassify.
#[async_trait]
pub trait Fetcher<K, V>: Send + Sync
where
    K: Send + Sync,
    V: Send,
{
    /// Stable identifier of the upstream, used for pacing and diagnostics.
    fn name(&self) -> &'static str;

    /// Fetch the value for `key` from the upstream.
    async fn fetch(&self, key: &K) -> Result<V, TollgateError>;
}

#[async_trait]
impl<K, V, F> Fetcher<K, V> for Arc<F>
where
    K: Send + Sync,
    V: Send,
    F: Fetcher<K, V> + ?Sized,
{
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn fetch(&self, key: &K) -> Result<V, TollgateError> {
        (**self).fetch(key).await
    }
}
