//! The stable response contract (spec.md §6, §7).

use crate::error::ErrorCategory;
use crate::types::{ActionId, Payload, Priority};

/// Optional observability metadata a response may carry (§6).
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct ResponseMetadata {
    pub execution_time_ms: Option<f64>,
    pub source: Option<&'static str>,
    pub action_id: Option<ActionId>,
    pub priority: Option<Priority>,
    pub delay_ms: Option<u64>,
    pub buffer_window_ms: Option<u64>,
}

impl ResponseMetadata {
    pub fn for_action(id: ActionId, priority: Priority) -> Self {
        Self {
            action_id: Some(id),
            priority: Some(priority),
            ..Default::default()
        }
    }
}

/// Structured detail attached to hard failures (§7 categories 5-10).
#[derive(Clone, Debug)]
pub struct ResponseError {
    pub category: ErrorCategory,
    pub detail: String,
}

/// `{ ok, payload, message, error?, metadata? }` from spec.md §6. `ok` covers
/// both "handler executed" and "short-circuited cleanly by a gate that is not
/// an error" — see `DESIGN.md` for how throttle/recuperation are resolved
/// given the spec's internal tension between §7 and the §8 literal scenarios.
#[derive(Clone, Debug)]
pub struct Response {
    pub ok: bool,
    pub payload: Payload,
    pub message: String,
    pub error: Option<ResponseError>,
    pub metadata: Option<ResponseMetadata>,
}

impl Response {
    pub fn ok(payload: Payload, message: impl Into<String>) -> Self {
        Self {
            ok: true,
            payload,
            message: message.into(),
            error: None,
            metadata: None,
        }
    }

    pub fn failed(message: impl Into<String>, category: ErrorCategory, detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            payload: Payload::null(),
            message: message.into(),
            error: Some(ResponseError {
                category,
                detail: detail.into(),
            }),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: ResponseMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Response shape for `init()` (§4.K): `{ ok, payload: timestamp | null, message }`.
#[derive(Clone, Debug)]
pub struct InitResponse {
    pub ok: bool,
    pub timestamp_ms: Option<u64>,
    pub message: String,
}

/// Response shape for `action()` registration (§4.G, §7).
#[derive(Clone, Debug)]
pub struct ActionOutcome {
    pub ok: bool,
    pub id: ActionId,
    pub message: String,
}

/// Per-channel metrics report (§6).
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct ChannelMetricsReport {
    pub execution_count: u64,
    pub last_exec_time_ms: Option<u64>,
    pub errors: u64,
    pub avg_duration_ms: f64,
}

/// System-wide metrics report (§6).
#[derive(Clone, Debug, serde::Serialize)]
pub struct SystemMetricsReport {
    pub total_calls: u64,
    pub total_errors: u64,
    pub calls_per_second: f64,
    pub stress: f64,
    pub pattern: &'static str,
    pub recuperating: bool,
    pub timers_active: usize,
}
