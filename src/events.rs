//! The event sink collaborator interface (spec.md §6 "Event sink
//! (telemetry)"). The core depends only on this trait; it does not prescribe
//! transport, matching the way `spark-core` separates its `Logger`/
//! `ObservabilityFacade` contracts from any concrete backend.

use std::fmt;
use std::sync::Arc;

use crate::types::{ActionId, Payload};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EventLevel {
    Debug,
    Info,
    Success,
    Warn,
    Error,
    Critical,
    Sys,
}

impl EventLevel {
    /// Coarse severity rank used by [`TracingSink`] to gate verbosity against
    /// `CYRE_LOG_LEVEL` (§6 "Environment": "`CYRE_LOG_LEVEL`... control[s]
    /// verbosity"). `Sys` and `Success` rank alongside `Info`: neither is more
    /// urgent than a plain informational event.
    fn rank(self) -> u8 {
        match self {
            EventLevel::Debug => 0,
            EventLevel::Info | EventLevel::Success | EventLevel::Sys => 1,
            EventLevel::Warn => 2,
            EventLevel::Error => 3,
            EventLevel::Critical => 4,
        }
    }

    /// Parses the `CYRE_LOG_LEVEL` value into a minimum-severity threshold.
    /// Unrecognized strings fall back to `Info`, the same default used when
    /// the variable is unset.
    fn from_env_value(value: &str) -> EventLevel {
        match value.to_ascii_lowercase().as_str() {
            "debug" | "trace" => EventLevel::Debug,
            "warn" | "warning" => EventLevel::Warn,
            "error" => EventLevel::Error,
            "critical" | "fatal" => EventLevel::Critical,
            _ => EventLevel::Info,
        }
    }
}

/// Subject of an event: a channel id, or the bare system.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EventSubject {
    Action(ActionId),
    System,
}

impl fmt::Display for EventSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventSubject::Action(id) => write!(f, "{id}"),
            EventSubject::System => write!(f, "system"),
        }
    }
}

/// A single telemetry event. `phase` is a short machine-stable string such as
/// `"throttle-blocked"` or `"pipeline-compiled"` (§6 gives the canonical
/// examples); `payload` carries whatever structured detail is available.
#[derive(Clone, Debug)]
pub struct SensorEvent {
    pub level: EventLevel,
    pub subject: EventSubject,
    pub phase: &'static str,
    pub payload: Option<Payload>,
}

impl SensorEvent {
    pub fn system(level: EventLevel, phase: &'static str) -> Self {
        Self {
            level,
            subject: EventSubject::System,
            phase,
            payload: None,
        }
    }

    pub fn action(level: EventLevel, id: ActionId, phase: &'static str) -> Self {
        Self {
            level,
            subject: EventSubject::Action(id),
            phase,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// The telemetry collaborator. A no-op sink must be acceptable (§6); this is
/// the default.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SensorEvent);
}

/// Default, no-op sink.
#[derive(Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: SensorEvent) {}
}

/// Forwards events into the `tracing` ecosystem. Gated behind the
/// `tracing-sink` feature so embedding applications that want a different
/// telemetry backend don't pay for this dependency.
#[cfg(feature = "tracing-sink")]
pub struct TracingSink {
    min_level: EventLevel,
}

#[cfg(feature = "tracing-sink")]
impl Default for TracingSink {
    fn default() -> Self {
        Self {
            min_level: EventLevel::Info,
        }
    }
}

#[cfg(feature = "tracing-sink")]
impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a sink whose verbosity floor comes from `CYRE_LOG_LEVEL`
    /// (§6). `None` (the variable unset) keeps the `Info` default.
    pub fn from_env_override(log_level: Option<&str>) -> Self {
        Self {
            min_level: log_level.map(EventLevel::from_env_value).unwrap_or(EventLevel::Info),
        }
    }
}

#[cfg(feature = "tracing-sink")]
impl EventSink for TracingSink {
    fn emit(&self, event: SensorEvent) {
        if event.level.rank() < self.min_level.rank() {
            return;
        }
        let subject = event.subject.to_string();
        match event.level {
            EventLevel::Debug => tracing::debug!(subject, phase = event.phase, "cyre event"),
            EventLevel::Info | EventLevel::Success => {
                tracing::info!(subject, phase = event.phase, "cyre event")
            }
            EventLevel::Warn => tracing::warn!(subject, phase = event.phase, "cyre event"),
            EventLevel::Error | EventLevel::Critical => {
                tracing::error!(subject, phase = event.phase, "cyre event")
            }
            EventLevel::Sys => tracing::info!(subject, phase = event.phase, "cyre system event"),
        }
    }
}

pub type SharedSink = Arc<dyn EventSink>;
