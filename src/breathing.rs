//! The adaptive stress controller (spec.md §4.F). Grounded on
//! `spark-core::governance::retry::adaptive`'s approach of folding a handful
//! of runtime signals into a single pressure scalar; here the scalar is the
//! `stress` score in `[0, 1]` instead of a retry-after duration, and
//! `arc_swap::ArcSwap` (a workspace dependency already used for
//! compare-and-swap snapshots elsewhere in the teacher crate family) replaces
//! a `RwLock` so readers on the hot call path never block a writer mid-tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::EngineConfig;
use crate::metrics::SystemMetrics;
use crate::types::Priority;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BreathingPattern {
    Normal,
    Recovery,
    Critical,
}

impl BreathingPattern {
    pub fn as_str(self) -> &'static str {
        match self {
            BreathingPattern::Normal => "NORMAL",
            BreathingPattern::Recovery => "RECOVERY",
            BreathingPattern::Critical => "CRITICAL",
        }
    }
}

/// Breathing snapshot (§3 "System state"). Exposed atomically: readers get a
/// consistent `(stress, pattern, is_recuperating)` triple even while a tick
/// is recomputing it.
#[derive(Clone, Debug)]
pub struct BreathingSnapshot {
    pub stress: f64,
    pub is_recuperating: bool,
    pub pattern: BreathingPattern,
    pub breath_count: u64,
    pub current_rate: f64,
}

impl Default for BreathingSnapshot {
    fn default() -> Self {
        Self {
            stress: 0.0,
            is_recuperating: false,
            pattern: BreathingPattern::Normal,
            breath_count: 0,
            current_rate: 0.0,
        }
    }
}

/// Outcome of an admission check (§4.F "Admission rule used by Call
/// Dispatcher").
pub enum Admission {
    Admit,
    Recuperating,
}

pub struct BreathingController {
    snapshot: ArcSwap<BreathingSnapshot>,
    metrics: Arc<SystemMetrics>,
    high_water: f64,
    low_water: f64,
    last_tick_ms: AtomicU64,
}

impl BreathingController {
    pub fn new(config: &EngineConfig, metrics: Arc<SystemMetrics>) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(BreathingSnapshot::default()),
            metrics,
            high_water: config.high_water,
            low_water: config.low_water,
            last_tick_ms: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> Arc<BreathingSnapshot> {
        self.snapshot.load_full()
    }

    /// §4.F step 1-4: compute combined stress, apply hysteresis, pick a
    /// pattern, publish atomically. Scheduled by the timer wheel under id
    /// `system-breathing`, nominally once per second.
    pub fn tick(&self, now_ms: u64) {
        let elapsed_ms = {
            let last = self.last_tick_ms.swap(now_ms, Ordering::Relaxed);
            (now_ms.saturating_sub(last)).max(1)
        };
        let (calls, errors) = self.metrics.drain_window();
        let rate = calls as f64 / (elapsed_ms as f64 / 1000.0);
        let error_rate = if calls == 0 {
            0.0
        } else {
            errors as f64 / calls as f64
        };

        // No external CPU/memory proxies are wired up (§4.F lists them as
        // optional); stress is a blend of call-rate pressure and error rate.
        // `RATE_SATURATION` is the throughput at which rate pressure alone
        // saturates stress to 1.0.
        const RATE_SATURATION: f64 = 500.0;
        let rate_pressure = (rate / RATE_SATURATION).min(1.0);
        let error_pressure = error_rate.min(1.0);
        let stress = (0.6 * rate_pressure + 0.4 * error_pressure).clamp(0.0, 1.0);

        let previous = self.snapshot.load();
        let is_recuperating = if previous.is_recuperating {
            stress >= self.low_water
        } else {
            stress >= self.high_water
        };

        let pattern = if stress >= self.high_water {
            BreathingPattern::Critical
        } else if is_recuperating {
            BreathingPattern::Recovery
        } else {
            BreathingPattern::Normal
        };

        self.snapshot.store(Arc::new(BreathingSnapshot {
            stress,
            is_recuperating,
            pattern,
            breath_count: previous.breath_count + 1,
            current_rate: rate,
        }));
    }

    /// §4.F "Admission rule": non-critical calls are rejected while
    /// recuperating.
    pub fn admit(&self, priority: Priority) -> Admission {
        let snapshot = self.snapshot.load();
        if snapshot.is_recuperating && !priority.is_critical() {
            Admission::Recuperating
        } else {
            Admission::Admit
        }
    }

    /// §4.A: "stressFactor = 1 + breathing.stress.combined", multiplied into
    /// every scheduled interval so periodic work slows under load.
    pub fn stress_factor(&self) -> f64 {
        1.0 + self.snapshot.load().stress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hysteresis_requires_dropping_below_low_water() {
        let config = EngineConfig {
            high_water: 0.7,
            low_water: 0.5,
            ..Default::default()
        };
        let metrics = Arc::new(SystemMetrics::default());
        let controller = BreathingController::new(&config, metrics.clone());

        for _ in 0..400 {
            metrics.record_call();
        }
        controller.tick(1000);
        assert!(controller.snapshot().is_recuperating);

        // Stress drops but stays above low_water: still recuperating.
        for _ in 0..260 {
            metrics.record_call();
        }
        controller.tick(2000);
        assert!(controller.snapshot().is_recuperating);

        // Now fully idle: drops below low_water, hysteresis clears.
        controller.tick(3000);
        assert!(!controller.snapshot().is_recuperating);
    }

    #[test]
    fn critical_priority_always_admitted() {
        let config = EngineConfig::default();
        let metrics = Arc::new(SystemMetrics::default());
        let controller = BreathingController::new(&config, metrics.clone());
        for _ in 0..1000 {
            metrics.record_call();
        }
        controller.tick(1000);
        assert!(controller.snapshot().is_recuperating);
        assert!(matches!(
            controller.admit(Priority::Critical),
            Admission::Admit
        ));
        assert!(matches!(
            controller.admit(Priority::Medium),
            Admission::Recuperating
        ));
    }
}
