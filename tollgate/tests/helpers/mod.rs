#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tollgate::{Fetcher, Gateway, RateLimitConfig};
use tollgate_mock::MockUpstream;

pub type Prices = Vec<f64>;

/// Gateway with two paced upstreams: one exchange, one price service.
pub fn gateway() -> Gateway {
    Gateway::builder()
        .with_upstream("binance", RateLimitConfig::per(1, Duration::from_secs(2)))
        .with_upstream("coingecko", RateLimitConfig::per(10, Duration::from_secs(1)))
        .build()
        .expect("valid gateway")
}

pub fn as_fetcher(up: &Arc<MockUpstream<Prices>>) -> Arc<dyn Fetcher<String, Prices>> {
    up.clone()
}
