//! The Handler Invoker (spec.md §4.J): awaits sync and async handlers
//! uniformly, converts panics into `ok: false` responses, applies the
//! per-action timeout, and always advances `_lastExecTime` so a failing hot
//! loop still cools down under throttle.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::action::CompiledAction;
use crate::clock::SharedClock;
use crate::error::ErrorCategory;
use crate::events::{EventLevel, SensorEvent, SharedSink};
use crate::subscriber::SharedHandler;
use crate::types::Payload;

pub struct InvokeOutcome {
    pub ok: bool,
    pub payload: Payload,
    pub message: String,
    pub error: Option<(ErrorCategory, String)>,
}

pub async fn invoke(
    action: &CompiledAction,
    handler: &SharedHandler,
    payload: Payload,
    clock: &SharedClock,
    sink: &SharedSink,
) -> InvokeOutcome {
    let started = clock.now_instant();
    let call = AssertUnwindSafe(handler.handle(payload)).catch_unwind();

    let outcome = match action.timeout {
        Some(timeout) => match tokio::time::timeout(timeout, call).await {
            Ok(result) => from_handler_result(action, result),
            Err(_) => {
                sink.emit(SensorEvent::action(
                    EventLevel::Error,
                    action.id.clone(),
                    "handler-timeout",
                ));
                InvokeOutcome {
                    ok: false,
                    payload: Payload::null(),
                    message: format!("handler for '{}' exceeded timeout", action.id),
                    error: Some((
                        ErrorCategory::HandlerTimeout,
                        format!("{timeout:?}"),
                    )),
                }
            }
        },
        None => from_handler_result(action, call.await),
    };

    let now = clock.now_ms();
    action.state.set_last_exec_time_ms(now);
    if outcome.ok {
        action.state.metrics.record_success(now, started.elapsed());
    } else {
        action.state.metrics.record_error(now);
        if !matches!(outcome.error, Some((ErrorCategory::HandlerTimeout, _))) {
            sink.emit(SensorEvent::action(
                EventLevel::Error,
                action.id.clone(),
                "handler-error",
            ));
        }
    }

    outcome
}

fn from_handler_result(
    action: &CompiledAction,
    result: Result<Payload, Box<dyn std::any::Any + Send>>,
) -> InvokeOutcome {
    match result {
        Ok(payload) => InvokeOutcome {
            ok: true,
            payload,
            message: "executed".to_string(),
            error: None,
        },
        Err(panic) => {
            let reason = panic_message(panic);
            InvokeOutcome {
                ok: false,
                payload: Payload::null(),
                message: format!("handler for '{}' failed: {reason}", action.id),
                error: Some((ErrorCategory::HandlerError, reason)),
            }
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

