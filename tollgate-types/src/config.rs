//! Configuration types shared across the gateway and its middleware.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TollgateError;

/// Target rate for one upstream: `count` operations per `delay`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Operations allowed per `delay`.
    pub count: u32,
    /// Period over which `count` operations may be dispatched.
    pub delay: Duration,
    /// Optional cap on operations in flight at once. `None` leaves execution
    /// concurrency unbounded; only dispatch is paced.
    #[serde(default)]
    pub max_concurrent: Option<usize>,
}

impl RateLimitConfig {
    /// `count` operations per `delay`, unbounded in-flight concurrency.
    #[must_use]
    pub const fn per(count: u32, delay: Duration) -> Self {
        Self {
            count,
            delay,
            max_concurrent: None,
        }
    }

    /// Cap the number of operations in flight at once.
    #[must_use]
    pub const fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = Some(max);
        self
    }

    /// Minimum spacing between consecutive dispatches, `floor(delay_ms / count)`.
    ///
    /// Returns `None` when `count` is zero.
    #[must_use]
    pub fn min_interval(&self) -> Option<Duration> {
        if self.count == 0 {
            return None;
        }
        let delay_ms = u64::try_from(self.delay.as_millis()).unwrap_or(u64::MAX);
        Some(Duration::from_millis(delay_ms / u64::from(self.count)))
    }

    /// Reject configurations that cannot pace anything.
    ///
    /// # Errors
    /// `GatewayError.InvalidConfiguration` when `count` is zero or
    /// `max_concurrent` is `Some(0)`.
    pub fn validate(&self) -> Result<(), TollgateError> {
        if self.count == 0 {
            return Err(TollgateError::invalid_configuration(
                "rate limit count must be at least 1",
            ));
        }
        if self.max_concurrent == Some(0) {
            return Err(TollgateError::invalid_configuration(
                "rate limit max_concurrent must be at least 1 when set",
            ));
        }
        Ok(())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per(1, Duration::from_secs(1))
    }
}

/// Defaults for single-flight caches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL applied by `get` when the caller does not pass one.
    pub default_ttl: Duration,
    /// When a refresh fails and a previous value exists, hand the previous value
    /// to the waiters instead of the error.
    #[serde(default)]
    pub serve_stale_on_error: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(60),
            serve_stale_on_error: false,
        }
    }
}

/// Options for a fan-out batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanOutOptions {
    /// Log each failed task together with its context.
    pub log_failures: bool,
    /// Return the first failure immediately instead of collecting every outcome.
    pub stop_on_error: bool,
}

impl FanOutOptions {
    /// Toggle failure logging.
    #[must_use]
    pub const fn log_failures(mut self, yes: bool) -> Self {
        self.log_failures = yes;
        self
    }

    /// Toggle fail-fast behavior.
    #[must_use]
    pub const fn stop_on_error(mut self, yes: bool) -> Self {
        self.stop_on_error = yes;
        self
    }
}

impl Default for FanOutOptions {
    fn default() -> Self {
        Self {
            log_failures: true,
            stop_on_error: false,
        }
    }
}

/// Global configuration for a `Gateway`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Pacing per named upstream endpoint.
    #[serde(default)]
    pub upstreams: BTreeMap<String, RateLimitConfig>,
    /// Defaults for caches created through the gateway.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Defaults for fan-out batches started through the gateway.
    #[serde(default)]
    pub fan_out: FanOutOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_interval_floors() {
        let cfg = RateLimitConfig::per(3, Duration::from_secs(1));
        assert_eq!(cfg.min_interval(), Some(Duration::from_millis(333)));
        let cfg = RateLimitConfig::per(1, Duration::from_secs(2));
        assert_eq!(cfg.min_interval(), Some(Duration::from_millis(2000)));
        let cfg = RateLimitConfig::per(0, Duration::from_secs(2));
        assert_eq!(cfg.min_interval(), None);
    }

    #[test]
    fn validate_rejects_zero_count_and_zero_concurrency() {
        assert!(RateLimitConfig::per(0, Duration::from_secs(1)).validate().is_err());
        assert!(
            RateLimitConfig::per(1, Duration::from_secs(1))
                .with_max_concurrent(0)
                .validate()
                .is_err()
        );
        assert!(RateLimitConfig::default().validate().is_ok());
    }
}
