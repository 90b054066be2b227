//! §3/§4.A interval/repeat/delay scheduling: a registered action with
//! `interval` + `repeat` fires repeatedly off the Timer Wheel rather than
//! once per `call()`, and `delay` offsets only the first firing.

mod support;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;

use cyre::{ActionConfig, Payload, Repeat};

#[tokio::test(start_paused = true)]
async fn interval_with_repeat_fires_on_the_timer_wheel_not_once_per_call() {
    let (engine, clock) = support::test_engine();
    engine.init().await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler_seen = seen.clone();
    engine.action(
        ActionConfig::new("tick")
            .interval(Duration::from_millis(100))
            .repeat(Repeat::Count(3)),
    );
    engine.on(
        "tick",
        Arc::new(move |p: Payload| {
            let seen = handler_seen.clone();
            async move {
                seen.lock().push(p.clone());
                p
            }
        }),
    );

    let scheduled = engine.call("tick", Some(Payload::from(json!("go")))).await;
    assert!(scheduled.ok);
    assert!(scheduled.message.contains("scheduled"));
    assert!(seen.lock().is_empty());

    for _ in 0..3 {
        support::advance(&clock, Duration::from_millis(100)).await;
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    // repeat=3 fires exactly three times, every 100ms, then stops.
    assert_eq!(seen.lock().len(), 3);
    assert!(seen.lock().iter().all(|p| *p == Payload::from(json!("go"))));

    support::advance(&clock, Duration::from_millis(100)).await;
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    assert_eq!(seen.lock().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn delay_offsets_only_the_first_firing() {
    let (engine, clock) = support::test_engine();
    engine.init().await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler_seen = seen.clone();
    engine.action(
        ActionConfig::new("delayed-tick")
            .interval(Duration::from_millis(100))
            .repeat(Repeat::Count(2))
            .delay(Duration::from_millis(250)),
    );
    engine.on(
        "delayed-tick",
        Arc::new(move |p: Payload| {
            let seen = handler_seen.clone();
            async move {
                seen.lock().push(p.clone());
                p
            }
        }),
    );

    engine.call("delayed-tick", None).await;

    // Still inside the 250ms delay: no firing yet, even past one interval
    // period's worth of elapsed time.
    support::advance(&clock, Duration::from_millis(200)).await;
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    assert!(seen.lock().is_empty());

    // Past the delay: first firing, then the normal 100ms cadence.
    support::advance(&clock, Duration::from_millis(100)).await;
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    assert_eq!(seen.lock().len(), 1);

    support::advance(&clock, Duration::from_millis(100)).await;
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    assert_eq!(seen.lock().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn a_second_call_against_an_armed_schedule_is_a_no_op() {
    let (engine, _clock) = support::test_engine();
    engine.init().await;

    engine.action(
        ActionConfig::new("already-armed")
            .interval(Duration::from_millis(100))
            .repeat(Repeat::Infinite),
    );
    engine.on("already-armed", Arc::new(|p: Payload| async move { p }));

    let first = engine.call("already-armed", None).await;
    assert!(first.ok);

    let second = engine.call("already-armed", None).await;
    assert!(second.ok);
    assert!(second.message.contains("already scheduled"));
}
