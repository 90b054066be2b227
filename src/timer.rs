//! The timer wheel (spec.md §4.A): the single scheduling primitive every
//! time-based protection (throttle's cooldown is stateless, but debounce,
//! buffer windows, interval/repeat and the breathing tick) goes through.
//!
//! Each kept timer owns one Tokio task. Pause/resume/cancel are delivered
//! through a `tokio::sync::watch` channel rather than by aborting the task
//! directly, so a paused timer can later resume with a freshly recomputed
//! `next_execution_time` (§5 "Cancellation": "`resume` rearms them with
//! residual duration, scaled by current stress").

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::breathing::BreathingController;
use crate::clock::SharedClock;
use crate::config::EngineConfig;
use crate::error::{CyreError, CyreResult};
use crate::events::{EventLevel, SensorEvent, SharedSink};
use crate::types::Repeat;

pub type TimerCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimerStatus {
    Active,
    Paused,
}

/// Timer metadata (§3 "Timer formation"), readable without touching the
/// scheduling task itself.
#[derive(Clone, Debug)]
pub struct TimerMeta {
    pub id: String,
    pub start_time_ms: u64,
    pub duration: Duration,
    pub original_duration: Duration,
    pub repeat: Option<Repeat>,
    pub execution_count: u64,
    pub next_execution_time_ms: u64,
    pub status: TimerStatus,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Control {
    Run,
    Paused,
    Cancelled,
}

struct TimerEntry {
    meta: Mutex<TimerMeta>,
    control: watch::Sender<Control>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Process-wide scheduling primitive (§5 "The Timer Wheel is a process-wide
/// singleton").
pub struct TimerWheel {
    clock: SharedClock,
    breathing: Arc<BreathingController>,
    entries: Arc<DashMap<String, Arc<TimerEntry>>>,
    hibernating: Arc<AtomicBool>,
    max_timeout: Duration,
    runaway_ceiling: u64,
    sink: SharedSink,
    anon_counter: AtomicU64,
}

impl TimerWheel {
    pub fn new(
        config: &EngineConfig,
        clock: SharedClock,
        breathing: Arc<BreathingController>,
        sink: SharedSink,
    ) -> Self {
        Self {
            clock,
            breathing,
            entries: Arc::new(DashMap::new()),
            hibernating: Arc::new(AtomicBool::new(false)),
            max_timeout: config.max_timeout,
            runaway_ceiling: config.runaway_execution_ceiling,
            sink,
            anon_counter: AtomicU64::new(0),
        }
    }

    pub fn is_hibernating(&self) -> bool {
        self.hibernating.load(Ordering::SeqCst)
    }

    pub fn active_count(&self) -> usize {
        self.entries.len()
    }

    /// §4.A `keep(duration, callback, repeat, id?) -> Result<Timer>`.
    /// `repeat = Some(Repeat::Count(0))` means the timer is never kept: the
    /// caller (a protection stage) is expected to have already produced its
    /// short-circuit response before calling this.
    pub fn keep(
        &self,
        duration: Duration,
        callback: TimerCallback,
        repeat: Option<Repeat>,
        id: Option<String>,
    ) -> CyreResult<Option<String>> {
        if let Some(r) = repeat {
            if r.is_zero() {
                return Ok(None);
            }
        }
        if self.hibernating.load(Ordering::SeqCst) {
            return Err(CyreError::TimerError {
                id: id.unwrap_or_default(),
                reason: "timer wheel is hibernating".into(),
            });
        }

        let id = id.unwrap_or_else(|| {
            let n = self.anon_counter.fetch_add(1, Ordering::Relaxed);
            format!("anon-timer-{n}")
        });

        // Re-arming an id cancels whatever was previously scheduled under it
        // (debounce's "if a debounce timer for this id is pending, cancel
        // it", §4.H.4).
        self.forget(&id);

        let now = self.clock.now_ms();
        let (control_tx, control_rx) = watch::channel(Control::Run);
        let meta = Mutex::new(TimerMeta {
            id: id.clone(),
            start_time_ms: now,
            duration,
            original_duration: duration,
            repeat,
            execution_count: 0,
            next_execution_time_ms: now + scaled_ms(duration, self.breathing.stress_factor()),
            status: TimerStatus::Active,
        });

        let entry = Arc::new(TimerEntry {
            meta,
            control: control_tx,
            task: Mutex::new(None),
        });
        self.entries.insert(id.clone(), entry.clone());

        let task = tokio::spawn(run_timer(
            id.clone(),
            entry.clone(),
            control_rx,
            callback,
            self.breathing.clone(),
            self.clock.clone(),
            self.hibernating.clone(),
            self.max_timeout,
            self.runaway_ceiling,
            self.sink.clone(),
            self.entries.clone(),
        ));
        *entry.task.lock() = Some(task);

        Ok(Some(id))
    }

    /// §4.A `forget(id)`: cancels the pending firing (and, by construction,
    /// any in-flight shard sleep for that timer).
    pub fn forget(&self, id: &str) -> bool {
        if let Some((_, entry)) = self.entries.remove(id) {
            let _ = entry.control.send(Control::Cancelled);
            if let Some(task) = entry.task.lock().take() {
                task.abort();
            }
            true
        } else {
            false
        }
    }

    /// `pause(id?)`: global when `id` is `None`, else per-timer.
    pub fn pause(&self, id: Option<&str>) {
        match id {
            Some(id) => {
                if let Some(entry) = self.entries.get(id) {
                    entry.meta.lock().status = TimerStatus::Paused;
                    let _ = entry.control.send(Control::Paused);
                }
            }
            None => {
                for entry in self.entries.iter() {
                    entry.meta.lock().status = TimerStatus::Paused;
                    let _ = entry.control.send(Control::Paused);
                }
            }
        }
    }

    /// `resume(id?)`: rearms with `next_execution_time` recomputed from now
    /// (§4.A, §5).
    pub fn resume(&self, id: Option<&str>) {
        let now = self.clock.now_ms();
        let rearm = |entry: &Arc<TimerEntry>| {
            let mut meta = entry.meta.lock();
            meta.status = TimerStatus::Active;
            meta.next_execution_time_ms = now + scaled_ms(meta.duration, self.breathing.stress_factor());
            drop(meta);
            let _ = entry.control.send(Control::Run);
        };
        match id {
            Some(id) => {
                if let Some(entry) = self.entries.get(id) {
                    rearm(&entry);
                }
            }
            None => {
                for entry in self.entries.iter() {
                    rearm(&entry);
                }
            }
        }
    }

    /// §4.A `hibernate()`: cancels and clears all timers, sets the global
    /// hibernation flag.
    pub fn hibernate(&self) {
        self.hibernating.store(true, Ordering::SeqCst);
        let ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.forget(&id);
        }
    }

    /// The dual of `hibernate()`: re-enables scheduling.
    pub fn reset(&self) {
        self.hibernating.store(false, Ordering::SeqCst);
    }

    pub fn meta(&self, id: &str) -> Option<TimerMeta> {
        self.entries.get(id).map(|e| e.meta.lock().clone())
    }
}

fn scaled_ms(duration: Duration, stress_factor: f64) -> u64 {
    ((duration.as_millis() as f64) * stress_factor) as u64
}

#[allow(clippy::too_many_arguments)]
async fn run_timer(
    id: String,
    entry: Arc<TimerEntry>,
    mut control_rx: watch::Receiver<Control>,
    callback: TimerCallback,
    breathing: Arc<BreathingController>,
    clock: SharedClock,
    hibernating: Arc<AtomicBool>,
    max_timeout: Duration,
    runaway_ceiling: u64,
    sink: SharedSink,
    entries: Arc<DashMap<String, Arc<TimerEntry>>>,
) {
    loop {
        // Honor a pause issued before or during the sleep.
        while *control_rx.borrow() == Control::Paused {
            if control_rx.changed().await.is_err() {
                return;
            }
        }
        if *control_rx.borrow() == Control::Cancelled {
            break;
        }

        // `remaining_unscaled` tracks time left in the action's own duration
        // units; the stress factor (and therefore the actual sleep length of
        // each shard) is re-read at every shard boundary, per §4.A.
        let mut remaining_unscaled = entry.meta.lock().duration;
        let mut paused = false;

        let cancelled = loop {
            if remaining_unscaled.is_zero() {
                break false;
            }
            let stress_factor = breathing.stress_factor();
            let scaled_remaining =
                Duration::from_millis(scaled_ms(remaining_unscaled, stress_factor));
            let chunk = scaled_remaining.min(max_timeout);

            tokio::select! {
                _ = tokio::time::sleep(chunk) => {}
                changed = control_rx.changed() => {
                    if changed.is_err() {
                        break true;
                    }
                    match *control_rx.borrow() {
                        Control::Cancelled => break true,
                        Control::Paused => {
                            paused = true;
                            break false;
                        }
                        Control::Run => {}
                    }
                }
            }

            let consumed_unscaled = Duration::from_millis(
                ((chunk.as_millis() as f64) / stress_factor.max(0.0001)) as u64,
            );
            remaining_unscaled = remaining_unscaled.saturating_sub(consumed_unscaled);
        };

        if paused {
            entry.meta.lock().duration = remaining_unscaled;
            continue;
        }
        if cancelled {
            break;
        }

        callback().await;

        let mut meta = entry.meta.lock();
        meta.execution_count += 1;
        meta.next_execution_time_ms = clock.now_ms();
        let execution_count = meta.execution_count;
        let repeat = meta.repeat;
        let original = meta.original_duration;
        meta.duration = original;
        drop(meta);

        if execution_count > runaway_ceiling {
            sink.emit(
                SensorEvent::system(EventLevel::Critical, "timer-runaway").with_payload(
                    crate::types::Payload::from(serde_json::json!({ "id": id })),
                ),
            );
            break;
        }

        if hibernating.load(Ordering::SeqCst) {
            break;
        }

        match repeat.and_then(Repeat::decrement) {
            Some(next) => {
                entry.meta.lock().repeat = Some(next);
            }
            None => break,
        }
    }

    entries.remove(&id);
}
