use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use proptest::prelude::*;
use tokio::time::{Instant, sleep};
use tollgate_core::{FanOutOptions, Task, TollgateError, UpstreamFamily, all, all_settled};

type Op = BoxFuture<'static, Result<u32, TollgateError>>;

fn delayed(
    ctx: &'static str,
    ms: u64,
    result: Result<u32, TollgateError>,
) -> Task<&'static str, Op> {
    Task::new(
        ctx,
        async move {
            sleep(Duration::from_millis(ms)).await;
            result
        }
        .boxed(),
    )
}

#[tokio::test(start_paused = true)]
async fn one_failure_does_not_affect_siblings() {
    let tasks = vec![
        delayed("binance", 10, Ok(1)),
        delayed(
            "kraken",
            5,
            Err(TollgateError::request_timeout(UpstreamFamily::Exchange, "kraken")),
        ),
        delayed("bitstamp", 20, Ok(3)),
    ];

    let outcomes = all(tasks, FanOutOptions::default())
        .await
        .expect("stop_on_error is off");

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].success());
    assert_eq!(outcomes[0].value(), Some(&1));
    assert!(!outcomes[1].success());
    assert_eq!(outcomes[1].context, "kraken");
    assert_eq!(
        outcomes[1].error().map(|e| e.kind().as_str()),
        Some("ExchangeError.NetworkError.RequestTimeout")
    );
    assert_eq!(outcomes[2].value(), Some(&3));

    let ok: Vec<_> = outcomes.successes().map(|(c, v)| (*c, *v)).collect();
    assert_eq!(ok, vec![("binance", 1), ("bitstamp", 3)]);
    assert_eq!(outcomes.failures().count(), 1);
}

#[tokio::test(start_paused = true)]
async fn outcomes_follow_input_order_not_completion_order() {
    let tasks = vec![
        delayed("slow", 30, Ok(1)),
        delayed("medium", 20, Ok(2)),
        delayed("fast", 10, Ok(3)),
    ];

    let outcomes = all_settled(tasks).await;
    let contexts: Vec<_> = outcomes.iter().map(|o| o.context).collect();
    assert_eq!(contexts, vec!["slow", "medium", "fast"]);
    let values: Vec<_> = outcomes.iter().filter_map(|o| o.value().copied()).collect();
    assert_eq!(values, vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn tasks_start_concurrently() {
    let start = Instant::now();
    let tasks = (0..5).map(|i| delayed("upstream", 100, Ok(i)));

    let outcomes = all_settled(tasks).await;

    assert_eq!(outcomes.len(), 5);
    // Five 100ms tasks finish together, not one after another.
    assert!(start.elapsed() < Duration::from_millis(150));
}

#[tokio::test(start_paused = true)]
async fn stop_on_error_returns_first_failure_and_leaves_others_running() {
    let finished = Arc::new(AtomicUsize::new(0));
    let mk = |ms: u64, fail: bool| {
        let finished = Arc::clone(&finished);
        async move {
            sleep(Duration::from_millis(ms)).await;
            finished.fetch_add(1, Ordering::SeqCst);
            if fail {
                Err(TollgateError::not_available(UpstreamFamily::Service, "coingecko"))
            } else {
                Ok(ms as u32)
            }
        }
        .boxed()
    };
    let tasks: Vec<Task<&'static str, Op>> = vec![
        Task::new("a", mk(50, false)),
        Task::new("b", mk(10, true)),
        Task::new("c", mk(40, false)),
    ];

    let err = all(tasks, FanOutOptions::default().stop_on_error(true))
        .await
        .expect_err("first failure aborts the batch");
    assert_eq!(err.kind().as_str(), "ServiceError.NotAvailable");
    assert_eq!(finished.load(Ordering::SeqCst), 1);

    sleep(Duration::from_millis(100)).await;
    assert_eq!(finished.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn partition_splits_by_result() {
    let tasks = vec![
        delayed("x", 0, Ok(7)),
        delayed("y", 0, Err(TollgateError::not_found("pair FOO/BAR"))),
    ];
    let (ok, failed) = all_settled(tasks).await.partition();
    assert_eq!(ok, vec![("x", 7)]);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, "y");
    assert!(failed[0].1.is_in_family("GatewayError.NotFound"));
}

proptest! {
    #[test]
    fn order_is_preserved_for_any_delays(delays in proptest::collection::vec(0u64..50, 0..12)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        let outcomes = rt.block_on(async {
            let tasks = delays.iter().enumerate().map(|(i, ms)| {
                let ms = *ms;
                Task::new(i, async move {
                    sleep(Duration::from_millis(ms)).await;
                    if ms % 7 == 0 {
                        Err(TollgateError::internal(format!("task {i}")))
                    } else {
                        Ok::<_, TollgateError>(i)
                    }
                })
            });
            all_settled(tasks).await
        });
        prop_assert_eq!(outcomes.len(), delays.len());
        for (i, o) in outcomes.iter().enumerate() {
            prop_assert_eq!(o.context, i);
            if let Some(v) = o.value() {
                prop_assert_eq!(*v, i);
            }
        }
    }
}
