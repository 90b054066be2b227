//! Call counters feeding both the per-channel metrics report and the
//! breathing controller's stress score (spec.md §3 "System state", §4.F,
//! §6).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::response::{ChannelMetricsReport, SystemMetricsReport};

/// Per-channel counters, updated only by the dispatcher and invoker (§3
/// invariant: derived fields are mutated in the call path, nowhere else).
#[derive(Default)]
pub struct ChannelMetrics {
    pub execution_count: AtomicU64,
    pub error_count: AtomicU64,
    pub last_exec_time_ms: AtomicU64,
    total_duration_ms: AtomicU64,
}

impl ChannelMetrics {
    pub fn record_success(&self, at_ms: u64, duration: Duration) {
        self.execution_count.fetch_add(1, Ordering::Relaxed);
        self.last_exec_time_ms.store(at_ms, Ordering::Relaxed);
        self.total_duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_error(&self, at_ms: u64) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
        self.last_exec_time_ms.store(at_ms, Ordering::Relaxed);
    }

    pub fn report(&self) -> ChannelMetricsReport {
        let count = self.execution_count.load(Ordering::Relaxed);
        let total = self.total_duration_ms.load(Ordering::Relaxed);
        let last = self.last_exec_time_ms.load(Ordering::Relaxed);
        ChannelMetricsReport {
            execution_count: count,
            last_exec_time_ms: if count == 0 && self.error_count.load(Ordering::Relaxed) == 0 {
                None
            } else {
                Some(last)
            },
            errors: self.error_count.load(Ordering::Relaxed),
            avg_duration_ms: if count == 0 {
                0.0
            } else {
                total as f64 / count as f64
            },
        }
    }
}

/// Process-wide rolling counters. `calls_per_second` is a simple
/// fixed-window rate: the breathing controller resets the window each tick
/// (§4.F "Aggregates rolling metrics (calls/sec, error rate...)").
#[derive(Default)]
pub struct SystemMetrics {
    pub total_calls: AtomicU64,
    pub total_errors: AtomicU64,
    window_calls: AtomicU64,
    window_errors: AtomicU64,
}

impl SystemMetrics {
    pub fn record_call(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.window_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
        self.window_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Drains the current window, returning `(calls, errors)` observed since
    /// the previous drain. Called once per breathing tick.
    pub fn drain_window(&self) -> (u64, u64) {
        (
            self.window_calls.swap(0, Ordering::Relaxed),
            self.window_errors.swap(0, Ordering::Relaxed),
        )
    }

    pub fn snapshot_totals(&self) -> (u64, u64) {
        (
            self.total_calls.load(Ordering::Relaxed),
            self.total_errors.load(Ordering::Relaxed),
        )
    }
}

pub fn build_system_report(
    metrics: &SystemMetrics,
    calls_per_second: f64,
    stress: f64,
    pattern: &'static str,
    recuperating: bool,
    timers_active: usize,
) -> SystemMetricsReport {
    let (total_calls, total_errors) = metrics.snapshot_totals();
    SystemMetricsReport {
        total_calls,
        total_errors,
        calls_per_second,
        stress,
        pattern,
        recuperating,
        timers_active,
    }
}
