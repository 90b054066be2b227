//! §8 end-to-end scenario 2: "Debounce coalescing."

mod support;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;

use cyre::{ActionConfig, Payload};

#[tokio::test(start_paused = true)]
async fn debounce_coalesces_to_the_last_payload() {
    let (engine, clock) = support::test_engine();
    engine.init().await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler_seen = seen.clone();
    engine.action(ActionConfig::new("d").debounce(Duration::from_millis(200)));
    engine.on(
        "d",
        Arc::new(move |p: Payload| {
            let seen = handler_seen.clone();
            async move {
                seen.lock().push(p.clone());
                p
            }
        }),
    );

    let provisional_1 = engine.call("d", Some(Payload::from(json!(1)))).await;
    assert!(provisional_1.ok);
    assert!(provisional_1.message.contains("debounced"));

    support::advance(&clock, Duration::from_millis(50)).await;
    engine.call("d", Some(Payload::from(json!(2)))).await;

    support::advance(&clock, Duration::from_millis(50)).await;
    engine.call("d", Some(Payload::from(json!(3)))).await;

    // Total elapsed so far: 100ms, well inside the 200ms window.
    assert!(seen.lock().is_empty());

    support::advance(&clock, Duration::from_millis(210)).await;
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }

    let observed = seen.lock().clone();
    assert_eq!(observed, vec![Payload::from(json!(3))]);
}

#[tokio::test(start_paused = true)]
async fn max_wait_forces_a_flush() {
    let (engine, clock) = support::test_engine();
    engine.init().await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler_seen = seen.clone();
    engine.action(
        ActionConfig::new("mw")
            .debounce(Duration::from_millis(200))
            .max_wait(Duration::from_millis(250)),
    );
    engine.on(
        "mw",
        Arc::new(move |p: Payload| {
            let seen = handler_seen.clone();
            async move {
                seen.lock().push(p.clone());
                p
            }
        }),
    );

    engine.call("mw", Some(Payload::from(json!("a")))).await;
    support::advance(&clock, Duration::from_millis(150)).await;
    engine.call("mw", Some(Payload::from(json!("b")))).await;
    support::advance(&clock, Duration::from_millis(150)).await;
    // 300ms since the debounce window started: maxWait (250ms) has elapsed,
    // so this call flushes synchronously instead of re-arming the timer.
    let flushing_call = engine.call("mw", Some(Payload::from(json!("c")))).await;
    assert!(flushing_call.ok);

    assert_eq!(seen.lock().clone(), vec![Payload::from(json!("c"))]);
}
