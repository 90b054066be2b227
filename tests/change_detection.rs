//! §8 end-to-end scenario 3: "Change detection."

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;

use cyre::{ActionConfig, Payload};

#[tokio::test(start_paused = true)]
async fn unchanged_payloads_are_skipped_not_failed() {
    let (engine, _clock) = support::test_engine();
    engine.init().await;

    let invocations = Arc::new(AtomicUsize::new(0));
    let handler_invocations = invocations.clone();
    engine.action(ActionConfig::new("c").detect_changes(true));
    engine.on(
        "c",
        Arc::new(move |p: Payload| {
            let invocations = handler_invocations.clone();
            async move {
                invocations.fetch_add(1, Ordering::SeqCst);
                p
            }
        }),
    );

    let first = engine.call("c", Some(Payload::from(json!({"v": 1})))).await;
    assert!(first.ok);
    assert_eq!(invocations.load(Ordering::SeqCst), 1);

    let repeated = engine.call("c", Some(Payload::from(json!({"v": 1})))).await;
    assert!(repeated.ok);
    assert!(repeated.message.contains("no change"));
    assert_eq!(invocations.load(Ordering::SeqCst), 1);

    let changed = engine.call("c", Some(Payload::from(json!({"v": 2})))).await;
    assert!(changed.ok);
    assert_eq!(invocations.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn has_changed_round_trips_through_the_public_api() {
    let (engine, _clock) = support::test_engine();
    engine.init().await;
    engine.action(ActionConfig::new("rt"));
    engine.on("rt", Arc::new(|p: Payload| async move { p }));

    let payload = Payload::from(json!({"a": 1, "b": 2}));
    assert!(engine.has_changed("rt", &payload));
    engine.call("rt", Some(payload.clone())).await;
    assert!(!engine.has_changed("rt", &payload));

    // Object key order must not matter for structural equality.
    let reordered = Payload::from(json!({"b": 2, "a": 1}));
    assert!(!engine.has_changed("rt", &reordered));

    let different = Payload::from(json!({"a": 1, "b": 3}));
    assert!(engine.has_changed("rt", &different));
}
