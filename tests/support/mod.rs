use std::sync::Arc;
use std::time::Duration;

use cyre::clock::{SharedClock, VirtualClock};
use cyre::config::EngineConfig;
use cyre::Cyre;

/// Builds an engine over a [`VirtualClock`], returning both the engine and a
/// handle to the clock so tests can advance wall time deterministically.
pub fn test_engine() -> (Cyre, VirtualClock) {
    test_engine_with(EngineConfig::default())
}

pub fn test_engine_with(config: EngineConfig) -> (Cyre, VirtualClock) {
    let clock = VirtualClock::new();
    let shared: SharedClock = Arc::new(clock.clone());
    (Cyre::with_clock(config, shared), clock)
}

/// Advances both the engine's virtual clock and Tokio's paused test clock in
/// lockstep, so `now_ms()` comparisons (throttle, debounce) and the Timer
/// Wheel's `tokio::time::sleep`-backed firings stay consistent. Requires the
/// test to run under `#[tokio::test(start_paused = true)]`.
pub async fn advance(clock: &VirtualClock, by: Duration) {
    clock.advance(by);
    tokio::time::advance(by).await;
}
