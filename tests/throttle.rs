//! §8 end-to-end scenario 1: "Throttle first-pass."

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cyre::{ActionConfig, Payload};

#[tokio::test(start_paused = true)]
async fn throttle_first_pass_then_blocks_then_cools_down() {
    let (engine, clock) = support::test_engine();
    engine.init().await;

    let count = Arc::new(AtomicUsize::new(0));
    let handler_count = count.clone();
    engine.action(
        ActionConfig::new("t").throttle(Duration::from_millis(1000)),
    );
    engine.on("t", Arc::new(move |p: Payload| {
        let count = handler_count.clone();
        async move {
            count.fetch_add(1, Ordering::SeqCst);
            p
        }
    }));

    let first = engine.call("t", None).await;
    assert!(first.ok);
    assert_eq!(count.load(Ordering::SeqCst), 1);

    let second = engine.call("t", None).await;
    assert!(!second.ok);
    assert!(second.message.contains("throttled"));
    assert_eq!(count.load(Ordering::SeqCst), 1);

    support::advance(&clock, Duration::from_millis(1100)).await;

    let third = engine.call("t", None).await;
    assert!(third.ok);
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn zero_throttle_never_blocks() {
    let (engine, _clock) = support::test_engine();
    engine.init().await;
    engine.action(ActionConfig::new("z").throttle(Duration::from_millis(0)));
    engine.on("z", Arc::new(|p: Payload| async move { p }));

    for _ in 0..5 {
        let response = engine.call("z", None).await;
        assert!(response.ok);
    }
}
