//! §8 end-to-end scenario 6: "Recuperation admission."

mod support;

use std::sync::Arc;
use std::time::Duration;

use cyre::config::EngineConfig;
use cyre::types::Priority;
use cyre::{ActionConfig, Payload};

#[tokio::test(start_paused = true)]
async fn recuperation_blocks_non_critical_calls_but_admits_critical_ones() {
    // A vanishingly small high-water mark means a single burst of calls is
    // enough to push the breathing controller into recuperation on its next
    // tick, without needing hundreds of synthetic calls.
    let config = EngineConfig {
        high_water: 0.001,
        low_water: 0.0005,
        breathing_tick: Duration::from_millis(100),
        ..Default::default()
    };
    let (engine, clock) = support::test_engine_with(config);
    engine.init().await;

    engine.action(ActionConfig::new("ordinary").priority(Priority::Medium));
    engine.on("ordinary", Arc::new(|p: Payload| async move { p }));

    engine.action(ActionConfig::new("urgent").priority(Priority::Critical));
    engine.on("urgent", Arc::new(|p: Payload| async move { p }));

    // Generate load for the breathing controller to measure.
    for _ in 0..20 {
        let response = engine.call("ordinary", None).await;
        assert!(response.ok);
    }

    // Let the breathing tick timer fire and observe that load.
    support::advance(&clock, Duration::from_millis(110)).await;
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    assert!(engine.get_system_metrics().recuperating);

    let blocked = engine.call("ordinary", None).await;
    assert!(!blocked.ok);
    assert!(blocked.message.contains("recuperating"));

    let admitted = engine.call("urgent", None).await;
    assert!(admitted.ok);
}
