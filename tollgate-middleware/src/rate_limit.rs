//! Dispatch pacing for one upstream endpoint.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::{Instant, sleep_until};
use tollgate_types::{RateLimitConfig, TollgateError};

/// Spaces consecutive dispatches by at least `floor(delay / count)`.
///
/// Operations are never dropped or rejected: a caller whose slot has not
/// arrived waits for it. Slots are handed out first-come first-served. Execution
/// concurrency is unbounded unless `max_concurrent` is configured.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    min_interval: Duration,
    next_available_at: Mutex<Option<Instant>>,
    permits: Option<Semaphore>,
}

impl RateLimiter {
    /// Create a limiter from a validated configuration.
    ///
    /// # Errors
    /// `GatewayError.InvalidConfiguration` when `count` is zero or
    /// `max_concurrent` is `Some(0)`.
    pub fn new(config: RateLimitConfig) -> Result<Self, TollgateError> {
        config.validate()?;
        let min_interval = config.min_interval().ok_or_else(|| {
            TollgateError::invalid_configuration("rate limit count must be at least 1")
        })?;
        let permits = config.max_concurrent.map(Semaphore::new);
        Ok(Self {
            config,
            min_interval,
            next_available_at: Mutex::new(None),
            permits,
        })
    }

    /// The configuration this limiter was built with.
    #[must_use]
    pub const fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Minimum spacing between consecutive dispatches.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Time until a newly scheduled operation could be dispatched, ignoring the
    /// in-flight cap.
    #[must_use]
    pub fn next_available_in(&self) -> Duration {
        let next = *self.lock();
        next.map_or(Duration::ZERO, |n| n.saturating_duration_since(Instant::now()))
    }

    /// Run `operation` once its dispatch slot arrives and return its output.
    ///
    /// The slot is reserved when `schedule` is first polled (after an in-flight
    /// permit is acquired, if capped). The outcome of `operation` never affects
    /// pacing. Dropping the returned future before dispatch leaves its slot
    /// unused.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "tollgate::middleware::rate_limit::schedule",
            skip_all,
            fields(min_interval_ms = self.min_interval.as_millis() as u64),
        )
    )]
    pub async fn schedule<F, Fut>(&self, operation: F) -> Fut::Output
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        // The semaphore is never closed, so acquisition only fails if that changes.
        let _permit = match &self.permits {
            Some(permits) => permits.acquire().await.ok(),
            None => None,
        };

        let slot = self.reserve();
        if slot > Instant::now() {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                wait_ms = slot.saturating_duration_since(Instant::now()).as_millis() as u64,
                "queued for dispatch slot"
            );
            sleep_until(slot).await;
        }
        operation().await
    }

    fn reserve(&self) -> Instant {
        let now = Instant::now();
        let mut next = self.lock();
        let slot = (*next).map_or(now, |n| n.max(now));
        *next = Some(slot + self.min_interval);
        slot
    }

    fn lock(&self) -> MutexGuard<'_, Option<Instant>> {
        self.next_available_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
