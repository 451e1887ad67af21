use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use tollgate_core::fanout::{self, Outcomes, Task};
use tollgate_core::{Emptiness, Fetcher};
use tollgate_middleware::{RateLimiter, TtlCache};
use tollgate_types::{
    CacheConfig, Envelope, ErrorRegistry, FanOutOptions, GatewayConfig, RateLimitConfig,
    TollgateError,
};

use crate::source::CachedSource;

/// Entry point that owns one rate limiter per named upstream and the defaults
/// used for caching, fan-out and error rendering.
pub struct Gateway {
    pub(crate) limiters: BTreeMap<String, Arc<RateLimiter>>,
    pub(crate) cfg: GatewayConfig,
    pub(crate) registry: Option<Arc<ErrorRegistry>>,
}

/// Builder for constructing a [`Gateway`].
pub struct GatewayBuilder {
    cfg: GatewayConfig,
    registry: Option<ErrorRegistry>,
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayBuilder {
    /// Create a builder with no upstreams and default cache and fan-out settings.
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(GatewayConfig::default())
    }

    /// Start from a deserialized configuration.
    #[must_use]
    pub fn from_config(cfg: GatewayConfig) -> Self {
        Self {
            cfg,
            registry: None,
        }
    }

    /// Register an upstream and its pacing. Registering a name twice keeps the
    /// last configuration.
    #[must_use]
    pub fn with_upstream(mut self, name: impl Into<String>, limit: RateLimitConfig) -> Self {
        self.cfg.upstreams.insert(name.into(), limit);
        self
    }

    /// Defaults for caches created through [`Gateway::cached_source`].
    #[must_use]
    pub fn cache(mut self, cfg: CacheConfig) -> Self {
        self.cfg.cache = cfg;
        self
    }

    /// Defaults for [`Gateway::fan_out`].
    #[must_use]
    pub fn fan_out(mut self, options: FanOutOptions) -> Self {
        self.cfg.fan_out = options;
        self
    }

    /// Render errors with a custom catalog instead of the built-in one.
    #[must_use]
    pub fn error_registry(mut self, registry: ErrorRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build the gateway.
    ///
    /// # Errors
    /// `GatewayError.InvalidConfiguration` when an upstream name is empty or its
    /// rate limit cannot pace anything.
    pub fn build(self) -> Result<Gateway, TollgateError> {
        let mut limiters = BTreeMap::new();
        for (name, limit) in &self.cfg.upstreams {
            if name.trim().is_empty() {
                return Err(TollgateError::invalid_configuration(
                    "upstream names must not be empty",
                ));
            }
            let limiter = RateLimiter::new(limit.clone()).map_err(|e| {
                TollgateError::invalid_configuration(format!("upstream '{name}': {}", e.message()))
            })?;
            limiters.insert(name.clone(), Arc::new(limiter));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(upstreams = limiters.len(), "gateway built");

        Ok(Gateway {
            limiters,
            cfg: self.cfg,
            registry: self.registry.map(Arc::new),
        })
    }
}

impl Gateway {
    /// Start building a gateway.
    #[must_use]
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// The configuration the gateway was built from.
    #[must_use]
    pub const fn config(&self) -> &GatewayConfig {
        &self.cfg
    }

    /// Names of the registered upstreams, sorted.
    pub fn upstreams(&self) -> impl Iterator<Item = &str> {
        self.limiters.keys().map(String::as_str)
    }

    /// The rate limiter for `name`, if registered.
    #[must_use]
    pub fn limiter(&self, name: &str) -> Option<&Arc<RateLimiter>> {
        self.limiters.get(name)
    }

    /// The error catalog used by [`render_error`](Self::render_error).
    #[must_use]
    pub fn registry(&self) -> &ErrorRegistry {
        match self.registry.as_deref() {
            Some(registry) => registry,
            None => ErrorRegistry::standard(),
        }
    }

    /// Run `op` through the named upstream's rate limiter.
    ///
    /// # Errors
    /// `GatewayError.NotSupported` when `name` is not a registered upstream;
    /// otherwise whatever `op` returns.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "tollgate::core::schedule",
            skip(self, op),
            fields(upstream = name)
        )
    )]
    pub async fn schedule<F, Fut, R>(&self, name: &str, op: F) -> Result<R, TollgateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, TollgateError>>,
    {
        let limiter = self.require(name)?;
        limiter.schedule(op).await
    }

    /// Run independent tasks concurrently with the configured fan-out options.
    ///
    /// # Errors
    /// Only when `stop_on_error` is configured: the first task failure.
    pub async fn fan_out<C, F, R, I>(&self, tasks: I) -> Result<Outcomes<C, R>, TollgateError>
    where
        I: IntoIterator<Item = Task<C, F>>,
        F: Future<Output = Result<R, TollgateError>> + Send + 'static,
        R: Send + 'static,
        C: std::fmt::Debug,
    {
        fanout::all(tasks, self.cfg.fan_out).await
    }

    /// A cache in front of `fetcher`, paced by the named upstream's limiter.
    ///
    /// # Errors
    /// `GatewayError.NotSupported` when `name` is not a registered upstream.
    pub fn cached_source<K, V>(
        &self,
        name: &str,
        fetcher: Arc<dyn Fetcher<K, V>>,
    ) -> Result<CachedSource<K, V>, TollgateError>
    where
        K: Eq + std::hash::Hash + Clone + Send + Sync + 'static,
        V: Clone + Emptiness + Send + Sync + 'static,
    {
        let limiter = Arc::clone(self.require(name)?);
        let cache = TtlCache::new(self.cfg.cache.clone());
        Ok(CachedSource::new(fetcher, limiter, cache))
    }

    /// Transport status and JSON envelope for `err`, using the gateway's
    /// catalog. Same as [`boundary::render`](crate::boundary::render) with
    /// [`registry`](Self::registry).
    #[must_use]
    pub fn render_error(&self, err: &TollgateError) -> (u16, Envelope) {
        crate::boundary::render(self.registry(), err)
    }

    fn require(&self, name: &str) -> Result<&Arc<RateLimiter>, TollgateError> {
        self.limiters
            .get(name)
            .ok_or_else(|| TollgateError::not_supported(format!("upstream {name}")))
    }
}
