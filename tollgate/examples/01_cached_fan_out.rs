use std::sync::Arc;
use std::time::Duration;

use tollgate::{
    CachedSource, Fetcher, Gateway, RateLimitConfig, Task, TollgateError, UpstreamFamily, boundary,
};
use tollgate_mock::{MockBehavior, MockUpstream};
use tracing_subscriber::fmt::format::FmtSpan;

type Ticker = Vec<f64>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Suggested: RUST_LOG=info,tollgate=debug,tollgate_middleware=debug,tollgate_core=debug
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
        .try_init();

    let gateway = Gateway::builder()
        .with_upstream("binance", RateLimitConfig::per(5, Duration::from_secs(1)))
        .with_upstream("kraken", RateLimitConfig::per(1, Duration::from_secs(1)))
        .build()?;

    let binance: Arc<dyn Fetcher<String, Ticker>> = Arc::new(
        MockUpstream::returning("binance", vec![64_010.5, 64_012.0])
            .with_delay(Duration::from_millis(80)),
    );
    let kraken: Arc<dyn Fetcher<String, Ticker>> = Arc::new(
        MockUpstream::failing(
            "kraken",
            TollgateError::ddos_protection(UpstreamFamily::Exchange, "kraken"),
        )
        .then(MockBehavior::Return(vec![64_008.0])),
    );

    let sources: Vec<CachedSource<String, Ticker>> = vec![
        gateway.cached_source("binance", binance)?,
        gateway.cached_source("kraken", kraken)?,
    ];

    // Round 0 fills the caches; round 1 forces a refresh, which kraken throttles.
    for round in 0..2 {
        let tasks = sources.iter().map(|source| {
            let source = source.clone();
            Task::new(source.name(), async move {
                if round == 0 {
                    source.get("BTC/USD".into()).await
                } else {
                    source.refresh("BTC/USD".into()).await
                }
            })
        });
        let outcomes = gateway.fan_out(tasks).await?;

        for (exchange, ticker) in outcomes.successes() {
            println!("round {round}: {exchange} -> {ticker:?}");
        }
        for (exchange, err) in outcomes.failures() {
            let (status, envelope) = boundary::render(gateway.registry(), err);
            println!(
                "round {round}: {exchange} failed with {status}: {}",
                serde_json::to_string(&envelope)?
            );
        }
    }

    if let Some(stale) = sources[1].peek(&"BTC/USD".to_string()) {
        println!("kraken still serves {:?} fetched at {}", stale.value, stale.fetched_at);
    }

    Ok(())
}
