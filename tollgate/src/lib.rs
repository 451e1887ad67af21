//! Tollgate shields a service from the upstream APIs it depends on.
//!
//! Overview
//! - `CachedSource` puts a per-key single-flight TTL cache in front of a
//!   `Fetcher`, so concurrent misses cost one upstream request.
//! - Each named upstream gets a `RateLimiter` that spaces dispatches and never
//!   drops work.
//! - `Gateway::fan_out` runs independent upstream calls concurrently and reports
//!   per-task outcomes in input order.
//! - Every failure is a `TollgateError` with a dotted kind; `render_error` turns it
//!   into a transport status and a JSON envelope.
//!
//! Key behaviors and trade-offs
//! - A failed or empty refresh leaves the previous entry in place. Waiters of a
//!   failed refresh receive the error unless `serve_stale_on_error` is set.
//! - Refreshes run as spawned tasks: a caller that gives up does not cancel the
//!   request for everyone else.
//! - Fan-out with `stop_on_error` returns early but leaves the remaining tasks
//!   running.
//!
//! Examples
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tollgate::{Gateway, RateLimitConfig};
//!
//! let gateway = Gateway::builder()
//!     .with_upstream("coingecko", RateLimitConfig::per(30, Duration::from_secs(60)))
//!     .build()?;
//!
//! let prices = gateway.cached_source("coingecko", Arc::new(CoinGeckoClient::new()))?;
//! let btc = prices.get("bitcoin".to_string()).await?;
//! ```
#![warn(missing_docs)]

/// Rendering of errors for HTTP-facing handlers.
pub mod boundary;
mod core;
mod source;

pub use crate::core::{Gateway, GatewayBuilder};
pub use crate::source::CachedSource;

pub use tollgate_core::fanout::{Outcomes, Task, TaskOutcome};
pub use tollgate_core::{Emptiness, Fetcher};
pub use tollgate_middleware::{CacheSnapshot, RateLimiter, TtlCache};
pub use tollgate_types::*;
