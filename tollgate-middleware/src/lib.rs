//! tollgate-middleware
//!
//! Call-shaping primitives placed in front of upstream fetchers.
//!
//! - `TtlCache`: per-key TTL cache with single-flight refresh.
//! - `RateLimiter`: first-come first-served dispatch pacing per upstream.
//!
//! Both spawn or sleep on Tokio and must be used inside a Tokio 1.x runtime.
#![warn(missing_docs)]

mod cache;
mod rate_limit;

pub use crate::cache::{CacheSnapshot, TtlCache};
pub use crate::rate_limit::RateLimiter;
