//! Fixed constants and environment overrides (spec.md §6 "Environment", plus
//! the named constants scattered through §4). Deliberately small: Cyre has no
//! layered, hot-reloadable configuration source the way `spark-core`'s
//! `configuration` module does, because the spec's fixed set of scheduling
//! policies (§1 Non-goals) leaves nothing for such a layer to vary at
//! runtime.

use std::time::Duration;

/// Tunable constants for one engine instance. All fields have defaults drawn
/// directly from the spec's prose (§4.A, §4.F).
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Stress threshold above which the breathing controller enters
    /// recuperation (§4.F).
    pub high_water: f64,
    /// Stress threshold below which recuperation clears (hysteresis, §4.F).
    pub low_water: f64,
    /// Timers longer than this are shard-chained (§4.A).
    pub max_timeout: Duration,
    /// A timer firing more than this many times is terminated as runaway
    /// (§4.A).
    pub runaway_execution_ceiling: u64,
    /// Intra-link chain depth bound (§4.I, §8).
    pub max_link_depth: u32,
    /// Nominal breathing-tick period (§4.F: "nominally once per second").
    pub breathing_tick: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            high_water: 0.7,
            low_water: 0.5,
            max_timeout: Duration::from_millis(i32::MAX as u64),
            runaway_execution_ceiling: 10_000,
            max_link_depth: 64,
            breathing_tick: Duration::from_secs(1),
        }
    }
}

/// Overrides read from the process environment at `Engine::init()` (§6).
#[derive(Clone, Debug, Default)]
pub struct EnvOverrides {
    pub log_level: Option<String>,
    pub test_mode: bool,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let log_level = std::env::var("CYRE_LOG_LEVEL").ok();
        let test_mode = std::env::var("CYRE_TEST_MODE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self {
            log_level,
            test_mode,
        }
    }
}
