//! Error taxonomy (spec.md §7). Every variant here is one of the ten
//! categories the spec enumerates. `CyreError` never escapes `call()` or
//! `action()` — both convert it into the appropriate field of their response
//! type instead of returning `Result<_, CyreError>` to the caller. The type
//! still exists (and implements `std::error::Error` via `thiserror`) because
//! internal plumbing — pipeline stages, the timer wheel, the invoker — needs
//! a real error type to propagate with `?`, the same way `spark-core::CoreError`
//! is the internal currency that `error::observability` later renders into
//! user-facing events.

use std::time::Duration;

use thiserror::Error;

use crate::types::ActionId;

/// The ten error categories from spec.md §7, kept as a separate enum from
/// `CyreError` so that sensors/metrics can group on category without
/// matching every variant (mirrors `spark_core::error::ErrorCategory`
/// sitting alongside `CoreError`).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorCategory {
    ConfigRejected,
    ConfigBlocked,
    NotRegistered,
    GateBlocked,
    ValidationFailed,
    HandlerError,
    HandlerTimeout,
    LinkDepthExceeded,
    TimerError,
    SystemError,
}

#[derive(Debug, Error)]
pub enum CyreError {
    #[error("action '{id}' rejected at registration: {reason}")]
    ConfigRejected { id: String, reason: String },

    #[error("action '{id}' is blocked: {reason}")]
    ConfigBlocked { id: ActionId, reason: String },

    #[error("action '{id}' is not registered")]
    NotRegistered { id: String },

    #[error("call to '{id}' rejected by {gate}: {message}")]
    GateBlocked {
        id: ActionId,
        gate: &'static str,
        message: String,
    },

    #[error("payload for '{id}' failed validation: {reason}")]
    ValidationFailed { id: ActionId, reason: String },

    #[error("handler for '{id}' failed: {reason}")]
    HandlerError { id: ActionId, reason: String },

    #[error("handler for '{id}' exceeded timeout of {timeout:?}")]
    HandlerTimeout { id: ActionId, timeout: Duration },

    #[error("intra-link depth exceeded {max} hops starting at '{origin}'")]
    LinkDepthExceeded { origin: ActionId, max: u32 },

    #[error("timer error for '{id}': {reason}")]
    TimerError { id: String, reason: String },

    #[error("system error: {reason}")]
    SystemError { reason: String },
}

impl CyreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CyreError::ConfigRejected { .. } => ErrorCategory::ConfigRejected,
            CyreError::ConfigBlocked { .. } => ErrorCategory::ConfigBlocked,
            CyreError::NotRegistered { .. } => ErrorCategory::NotRegistered,
            CyreError::GateBlocked { .. } => ErrorCategory::GateBlocked,
            CyreError::ValidationFailed { .. } => ErrorCategory::ValidationFailed,
            CyreError::HandlerError { .. } => ErrorCategory::HandlerError,
            CyreError::HandlerTimeout { .. } => ErrorCategory::HandlerTimeout,
            CyreError::LinkDepthExceeded { .. } => ErrorCategory::LinkDepthExceeded,
            CyreError::TimerError { .. } => ErrorCategory::TimerError,
            CyreError::SystemError { .. } => ErrorCategory::SystemError,
        }
    }

    /// True for the three gate outcomes the spec treats as expected policy,
    /// not failures (§7 "User-visible behavior") — except where §8's literal
    /// scenarios override that default; see `DESIGN.md` "Open Question
    /// decisions" for why throttle/recuperation are excluded here.
    pub fn is_hard_failure(&self) -> bool {
        !matches!(self, CyreError::GateBlocked { .. })
    }
}

pub type CyreResult<T> = std::result::Result<T, CyreError>;
