//! §8 end-to-end scenario 4 ("Required + block") and the registration
//! idempotence property.

mod support;

use std::sync::Arc;

use serde_json::json;

use cyre::{ActionConfig, Payload, Repeat};

#[tokio::test(start_paused = true)]
async fn required_without_payload_fails_registration() {
    let (engine, _clock) = support::test_engine();
    engine.init().await;

    let outcome = engine.action(ActionConfig::new("r").required(true));
    assert!(!outcome.ok);
}

#[tokio::test(start_paused = true)]
async fn blocked_action_registers_ok_but_calls_are_refused() {
    let (engine, _clock) = support::test_engine();
    engine.init().await;

    let outcome = engine.action(
        ActionConfig::new("b")
            .block(true)
            .payload(Payload::from(json!(1))),
    );
    assert!(outcome.ok);

    engine.on("b", Arc::new(|p: Payload| async move { p }));
    let response = engine.call("b", None).await;
    assert!(!response.ok);
    assert!(response.message.contains("blocked"));
}

#[tokio::test(start_paused = true)]
async fn repeat_zero_is_reported_ok_at_registration_but_never_executes() {
    let (engine, _clock) = support::test_engine();
    engine.init().await;

    let outcome = engine.action(ActionConfig::new("never").repeat(Repeat::Count(0)));
    assert!(outcome.ok);

    engine.on("never", Arc::new(|p: Payload| async move { p }));
    let response = engine.call("never", None).await;
    assert!(response.ok);
    assert!(response.message.contains("not executed"));
}

#[tokio::test(start_paused = true)]
async fn reregistering_the_same_id_leaves_a_single_working_pipeline() {
    let (engine, _clock) = support::test_engine();
    engine.init().await;

    engine.action(ActionConfig::new("idem").throttle(std::time::Duration::from_millis(1000)));
    engine.action(ActionConfig::new("idem").throttle(std::time::Duration::from_millis(1000)));
    engine.on("idem", Arc::new(|p: Payload| async move { p }));

    let first = engine.call("idem", None).await;
    assert!(first.ok);
    let second = engine.call("idem", None).await;
    assert!(!second.ok);
    assert!(second.message.contains("throttled"));
}
