//! Monotonic time source (spec.md §4.A). Abstracted behind a trait so tests
//! can substitute a virtual clock instead of sleeping in real time, the way
//! `spark-core::time::clock` separates `Clock` from its Tokio-backed default.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A monotonic millisecond time source.
pub trait Clock: Send + Sync {
    /// Milliseconds elapsed since the clock's epoch (process start for
    /// [`SystemClock`], a manually-advanced counter for [`VirtualClock`]).
    fn now_ms(&self) -> u64;

    fn now_instant(&self) -> Instant {
        Instant::now()
    }
}

/// Real wall/monotonic clock, backed by `Instant`.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// A manually-advanced clock for deterministic tests (§4.A: "Tests must be
/// able to substitute a virtual clock"; §6: selected when `CYRE_TEST_MODE` is
/// set).
#[derive(Clone)]
pub struct VirtualClock {
    millis: Arc<AtomicU64>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.millis.store(ms, Ordering::SeqCst);
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for VirtualClock {
    fn now_ms(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

pub type SharedClock = Arc<dyn Clock>;
