//! The engine: ties every collaborator together behind one struct so an
//! embedding application can run multiple independent instances (§9 "Global
//! mutable state" — "An implementation may encapsulate singletons behind a
//! single 'engine' object... the public API then operates on a default
//! instance").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::action::ActionConfig;
use crate::breathing::BreathingController;
use crate::buffer_store::BufferStore;
use crate::clock::{SharedClock, SystemClock, VirtualClock};
use crate::config::{EngineConfig, EnvOverrides};
use crate::dispatcher;
use crate::error::{CyreError, ErrorCategory};
use crate::events::{EventLevel, NoopSink, SensorEvent, SharedSink};
use crate::metrics::{build_system_report, SystemMetrics};
use crate::payload_store::PayloadStore;
use crate::registry::ActionRegistry;
use crate::response::{ActionOutcome, ChannelMetricsReport, InitResponse, Response, SystemMetricsReport};
use crate::subscriber::{SharedHandler, SubscriberTable};
use crate::timer::TimerWheel;
use crate::types::{ActionId, Payload};

/// Picks the sink `Cyre::new` wires up by default: the `tracing` ecosystem,
/// filtered by `CYRE_LOG_LEVEL` (§6), when the `tracing-sink` feature is
/// compiled in — a silent [`NoopSink`] otherwise, since there is no backend
/// for `CYRE_LOG_LEVEL` to gate without it. `with_collaborators` remains the
/// way an embedding application substitutes its own sink regardless of this
/// default.
fn default_sink(overrides: &EnvOverrides) -> SharedSink {
    #[cfg(feature = "tracing-sink")]
    {
        Arc::new(crate::events::TracingSink::from_env_override(overrides.log_level.as_deref()))
    }
    #[cfg(not(feature = "tracing-sink"))]
    {
        let _ = overrides;
        Arc::new(NoopSink)
    }
}

/// Everything shared across clones of a [`Cyre`] handle. Protections and the
/// dispatcher borrow this through `Arc`, never owning it outright, so timer
/// callbacks can hold their own `Arc<EngineInner>` past the lifetime of any
/// single `call()`.
pub struct EngineInner {
    pub config: EngineConfig,
    pub clock: SharedClock,
    pub sink: SharedSink,
    pub registry: ActionRegistry,
    pub subscribers: SubscriberTable,
    pub payload_store: PayloadStore,
    pub buffer_store: BufferStore,
    pub timers: TimerWheel,
    pub breathing: Arc<BreathingController>,
    pub system_metrics: Arc<SystemMetrics>,
    initialized: AtomicBool,
    locked: AtomicBool,
}

/// A Cyre engine instance (§9). Cheap to clone: it is a thin handle around an
/// `Arc<EngineInner>`.
#[derive(Clone)]
pub struct Cyre {
    inner: Arc<EngineInner>,
}

impl Default for Cyre {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Cyre {
    pub fn new(config: EngineConfig) -> Self {
        let overrides = EnvOverrides::from_env();
        let clock: SharedClock = if overrides.test_mode {
            Arc::new(VirtualClock::new())
        } else {
            Arc::new(SystemClock::new())
        };
        let sink = default_sink(&overrides);
        Self::with_collaborators(config, clock, sink)
    }

    pub fn with_clock(config: EngineConfig, clock: SharedClock) -> Self {
        Self::with_collaborators(config, clock, Arc::new(NoopSink))
    }

    pub fn with_collaborators(config: EngineConfig, clock: SharedClock, sink: SharedSink) -> Self {
        let system_metrics = Arc::new(SystemMetrics::default());
        let breathing = Arc::new(BreathingController::new(&config, system_metrics.clone()));
        let timers = TimerWheel::new(&config, clock.clone(), breathing.clone(), sink.clone());

        Self {
            inner: Arc::new(EngineInner {
                config,
                clock,
                sink,
                registry: ActionRegistry::new(),
                subscribers: SubscriberTable::new(),
                payload_store: PayloadStore::new(),
                buffer_store: BufferStore::new(),
                timers,
                breathing,
                system_metrics,
                initialized: AtomicBool::new(false),
                locked: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn inner(&self) -> &Arc<EngineInner> {
        &self.inner
    }

    /// §4.K `init()`: idempotent, arms the breathing tick, transitions to
    /// initialized.
    pub async fn init(&self) -> InitResponse {
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            return InitResponse {
                ok: true,
                timestamp_ms: Some(self.inner.clock.now_ms()),
                message: "already initialized".to_string(),
            };
        }

        self.inner.timers.reset();
        let engine = self.inner.clone();
        let tick = self.inner.config.breathing_tick;
        let callback: crate::timer::TimerCallback = Arc::new(move || {
            let engine = engine.clone();
            Box::pin(async move {
                let now = engine.clock.now_ms();
                engine.breathing.tick(now);
                let snapshot = engine.breathing.snapshot();
                engine.sink.emit(
                    SensorEvent::system(EventLevel::Sys, "breathing-update").with_payload(
                        Payload::from(serde_json::json!({
                            "stress": snapshot.stress,
                            "pattern": snapshot.pattern.as_str(),
                            "isRecuperating": snapshot.is_recuperating,
                        })),
                    ),
                );
            })
        });
        let _ = self.inner.timers.keep(
            tick,
            callback,
            Some(crate::types::Repeat::Infinite),
            Some("system-breathing".to_string()),
        );

        self.inner
            .sink
            .emit(SensorEvent::system(EventLevel::Info, "system-initialization"));

        InitResponse {
            ok: true,
            timestamp_ms: Some(self.inner.clock.now_ms()),
            message: "initialized".to_string(),
        }
    }

    /// §4.G: validates and compiles `config`, inserting it into the
    /// Registry and seeding the Payload Store.
    pub fn action(&self, config: ActionConfig) -> ActionOutcome {
        let id_for_error = "unknown".to_string();
        match config.compile() {
            Ok(compiled) => {
                let id = compiled.id.clone();
                let initial = compiled.initial_payload.clone();
                self.inner.registry.insert(compiled);
                self.inner.payload_store.seed(&id, initial);
                self.inner.sink.emit(SensorEvent::action(
                    EventLevel::Info,
                    id.clone(),
                    "pipeline-compiled",
                ));
                ActionOutcome {
                    ok: true,
                    id,
                    message: "registered".to_string(),
                }
            }
            Err(CyreError::ConfigRejected { id, reason }) => ActionOutcome {
                ok: false,
                id: if id.is_empty() {
                    ActionId::new(id_for_error)
                } else {
                    ActionId::new(id)
                },
                message: reason,
            },
            Err(other) => ActionOutcome {
                ok: false,
                id: ActionId::new(id_for_error),
                message: other.to_string(),
            },
        }
    }

    /// §4.K `on(id, handler)`.
    pub fn on(&self, id: impl Into<ActionId>, handler: SharedHandler) {
        let id = id.into();
        self.inner.subscribers.on(&id, handler, &self.inner.sink);
    }

    /// §4.I `call(id, payload?)`.
    pub async fn call(&self, id: impl Into<ActionId>, payload: Option<Payload>) -> Response {
        if self.inner.locked.load(Ordering::SeqCst) {
            return Response::failed(
                "engine is locked: registration and calls are frozen",
                ErrorCategory::SystemError,
                "locked",
            );
        }
        dispatcher::call(self.inner.clone(), id.into(), payload).await
    }

    /// §4.B/§4.K `forget(id)`.
    pub fn forget(&self, id: impl Into<ActionId>) -> bool {
        let id = id.into();
        self.inner.registry.forget(
            &id,
            &self.inner.timers,
            &self.inner.payload_store,
            &self.inner.buffer_store,
            &self.inner.subscribers,
        )
    }

    /// `pause(id?)`: global when `id` is `None`.
    pub fn pause(&self, id: Option<&str>) {
        self.inner.timers.pause(id);
    }

    /// `resume(id?)`: global when `id` is `None`.
    pub fn resume(&self, id: Option<&str>) {
        self.inner.timers.resume(id);
    }

    pub fn lock(&self) {
        self.inner.locked.store(true, Ordering::SeqCst);
    }

    pub fn unlock(&self) {
        self.inner.locked.store(false, Ordering::SeqCst);
    }

    pub fn get(&self, id: impl Into<ActionId>) -> Option<Payload> {
        self.inner.payload_store.current(&id.into())
    }

    pub fn get_previous(&self, id: impl Into<ActionId>) -> Option<Payload> {
        self.inner.payload_store.previous(&id.into())
    }

    pub fn has_changed(&self, id: impl Into<ActionId>, payload: &Payload) -> bool {
        self.inner.payload_store.has_changed(&id.into(), payload)
    }

    /// `clear()`: drops every channel, its timers, handler and stored
    /// payload, without hibernating the wheel.
    pub fn clear(&self) {
        self.inner.registry.clear();
        self.inner.subscribers.clear();
        self.inner.payload_store.clear();
        self.inner.buffer_store.clear();
    }

    /// `reset()`: the dual of `shutdown()` — re-enables scheduling.
    pub fn reset(&self) {
        self.inner.timers.reset();
    }

    /// `shutdown()`: hibernates the wheel and clears all in-memory state
    /// (§5 "Cancellation").
    pub fn shutdown(&self) {
        self.inner.timers.hibernate();
        self.clear();
        self.inner.initialized.store(false, Ordering::SeqCst);
        self.inner
            .sink
            .emit(SensorEvent::system(EventLevel::Info, "system-shutdown"));
    }

    /// `status() → boolean`: true iff hibernating.
    pub fn status(&self) -> bool {
        self.inner.timers.is_hibernating()
    }

    /// Traverses the Registry and Payload Store to produce `{ id -> current
    /// payload }` pairs for an external persistence snapshot collaborator
    /// (§6). Derived state (`_lastExecTime`, pipelines, timers) is
    /// deliberately not included — hydration re-invokes `action()` per entry.
    pub fn snapshot_sources(&self) -> Vec<(ActionId, Option<Payload>)> {
        self.inner
            .registry
            .ids()
            .into_iter()
            .map(|id| {
                let current = self.inner.payload_store.current(&id);
                (id, current)
            })
            .collect()
    }

    pub fn get_channel_metrics(&self, id: impl Into<ActionId>) -> Option<ChannelMetricsReport> {
        let id = id.into();
        self.inner
            .registry
            .get(&id)
            .map(|action| action.state.metrics.report())
    }

    pub fn get_system_metrics(&self) -> SystemMetricsReport {
        let snapshot = self.inner.breathing.snapshot();
        build_system_report(
            &self.inner.system_metrics,
            snapshot.current_rate,
            snapshot.stress,
            snapshot.pattern.as_str(),
            snapshot.is_recuperating,
            self.inner.timers.active_count(),
        )
    }
}
