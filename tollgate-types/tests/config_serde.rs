use std::time::Duration;

use tollgate_types::{CacheConfig, FanOutOptions, GatewayConfig, RateLimitConfig};

#[test]
fn rate_limit_config_roundtrip() {
    let cfg = RateLimitConfig::per(10, Duration::from_secs(60)).with_max_concurrent(4);

    let json = serde_json::to_string(&cfg).expect("serialize rate limit config");
    let de: RateLimitConfig = serde_json::from_str(&json).expect("deserialize rate limit config");

    assert_eq!(de.count, 10);
    assert_eq!(de.delay.as_secs(), 60);
    assert_eq!(de.max_concurrent, Some(4));
    assert_eq!(de.min_interval(), Some(Duration::from_millis(6000)));
}

#[test]
fn gateway_config_roundtrip_and_defaults() {
    let mut cfg = GatewayConfig::default();
    cfg.upstreams.insert(
        "coinmarketcap".into(),
        RateLimitConfig::per(30, Duration::from_secs(60)),
    );
    cfg.cache = CacheConfig {
        default_ttl: Duration::from_secs(300),
        serve_stale_on_error: true,
    };
    cfg.fan_out = FanOutOptions::default().stop_on_error(true);

    let json = serde_json::to_string(&cfg).expect("serialize gateway config");
    let de: GatewayConfig = serde_json::from_str(&json).expect("deserialize gateway config");
    assert_eq!(de, cfg);

    let sparse: GatewayConfig = serde_json::from_str("{}").expect("deserialize empty config");
    assert!(sparse.upstreams.is_empty());
    assert_eq!(sparse.cache, CacheConfig::default());
    assert!(sparse.fan_out.log_failures);
    assert!(!sparse.fan_out.stop_on_error);
}
