//! Property tests for the invariants §8 calls out explicitly: throttle's
//! call-count bound, change-detection's one-invocation-per-boundary
//! property, and transform-identity round-tripping the payload unchanged.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use serde_json::{json, Value};

use cyre::{ActionConfig, Payload};

fn small_payload() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(json!(0)),
        Just(json!(1)),
        Just(json!(2)),
        Just(json!("a")),
        Just(json!("b")),
    ]
}

proptest! {
    /// Over any sequence of inter-call gaps, the number of calls the
    /// throttle gate actually admits never exceeds what a reference model
    /// computing `now - last_exec >= throttle_ms` independently predicts.
    #[test]
    fn throttle_admits_no_more_than_the_cooldown_allows(
        gaps in prop::collection::vec(0u64..300, 1..20),
    ) {
        let throttle_ms = 100u64;
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let (engine, clock) = support::test_engine();
            engine.init().await;
            engine.action(ActionConfig::new("t").throttle(Duration::from_millis(throttle_ms)));
            let count = Arc::new(AtomicUsize::new(0));
            let handler_count = count.clone();
            engine.on("t", Arc::new(move |p: Payload| {
                let count = handler_count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    p
                }
            }));

            let mut expected = 0usize;
            let mut last_exec: Option<u64> = None;
            let mut now = 0u64;

            for gap in gaps {
                clock.advance(Duration::from_millis(gap));
                now += gap;
                let admitted = match last_exec {
                    None => true,
                    Some(last) => now.saturating_sub(last) >= throttle_ms,
                };
                if admitted {
                    expected += 1;
                    last_exec = Some(now);
                }
                engine.call("t", None).await;
            }

            prop_assert_eq!(count.load(Ordering::SeqCst), expected);
            Ok(())
        })?;
    }

    /// Over any sequence of payloads fed to a change-detecting action, the
    /// handler fires exactly once per "boundary" — a payload structurally
    /// different from the one immediately before it (the very first call
    /// always counts as a boundary).
    #[test]
    fn change_detection_fires_once_per_boundary(
        payloads in prop::collection::vec(small_payload(), 1..15),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let (engine, _clock) = support::test_engine();
            engine.init().await;
            engine.action(ActionConfig::new("cd").detect_changes(true));
            let count = Arc::new(AtomicUsize::new(0));
            let handler_count = count.clone();
            engine.on("cd", Arc::new(move |p: Payload| {
                let count = handler_count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    p
                }
            }));

            let mut expected = 0usize;
            let mut previous: Option<Value> = None;
            for value in &payloads {
                if previous.as_ref() != Some(value) {
                    expected += 1;
                }
                previous = Some(value.clone());
                engine.call("cd", Some(Payload::from(value.clone()))).await;
            }

            prop_assert_eq!(count.load(Ordering::SeqCst), expected);
            Ok(())
        })?;
    }

    /// An identity transform must never alter what the handler observes nor
    /// what the caller gets back.
    #[test]
    fn identity_transform_round_trips_the_payload(value in small_payload()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let value_for_assert = value.clone();
        rt.block_on(async move {
            let (engine, _clock) = support::test_engine();
            engine.init().await;
            engine.action(ActionConfig::new("id").transform(|p: Payload| p));
            engine.on("id", Arc::new(|p: Payload| async move { p }));

            let response = engine.call("id", Some(Payload::from(value.clone()))).await;
            prop_assert!(response.ok);
            prop_assert_eq!(response.payload.0, value);
            Ok(())
        })?;
        let _ = value_for_assert;
    }
}
