//! The Call Dispatcher (spec.md §4.I): the entry point for every `call`.
//! Runs the fixed gate sequence (recuperation admission, then throttle or
//! debounce or buffer — §3 invariant 3 mutual exclusion), the compiled tail
//! pipeline, the handler invoker, and finally intra-link follow-through.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::action::CompiledAction;
use crate::breathing::Admission;
use crate::engine::EngineInner;
use crate::error::{CyreError, ErrorCategory};
use crate::events::{EventLevel, SensorEvent};
use crate::invoker;
use crate::pipeline::{self, TailOutcome};
use crate::response::{Response, ResponseMetadata};
use crate::timer::TimerCallback;
use crate::types::{ActionId, BufferStrategy, Payload};

/// Entry point used by [`crate::engine::Cyre::call`]. Link depth starts at 0.
pub fn call(engine: Arc<EngineInner>, id: ActionId, payload: Option<Payload>) -> BoxFuture<'static, Response> {
    call_with_depth(engine, id, payload, 0)
}

fn call_with_depth(
    engine: Arc<EngineInner>,
    id: ActionId,
    payload: Option<Payload>,
    depth: u32,
) -> BoxFuture<'static, Response> {
    Box::pin(async move {
        if depth > engine.config.max_link_depth {
            return Response::failed(
                format!("intra-link depth exceeded {} hops", engine.config.max_link_depth),
                ErrorCategory::LinkDepthExceeded,
                id.to_string(),
            );
        }

        if id.is_empty() {
            return Response::failed("action id must not be empty", ErrorCategory::NotRegistered, "");
        }

        let Some(action) = engine.registry.get(&id) else {
            return Response::failed(
                format!("action '{id}' is not registered"),
                ErrorCategory::NotRegistered,
                id.to_string(),
            );
        };

        // §7 category 4 carves repeat=0 out as an `ok: true` GateBlocked
        // short-circuit, distinct from every other blocking reason (which is
        // a hard `ConfigBlocked` failure) — `is_hard_failure()` is the single
        // place that distinction is decided.
        if let Some(reason) = &action.block_reason {
            let err = if action.repeat_zero_blocked {
                CyreError::GateBlocked {
                    id: action.id.clone(),
                    gate: "repeat-zero",
                    message: reason.clone(),
                }
            } else {
                CyreError::ConfigBlocked {
                    id: action.id.clone(),
                    reason: reason.clone(),
                }
            };
            if !err.is_hard_failure() {
                return Response::ok(
                    Payload::null(),
                    format!("action '{id}' registered but not executed: {reason}"),
                )
                .with_metadata(ResponseMetadata::for_action(action.id.clone(), action.priority));
            }
            return Response::failed(err.to_string(), err.category(), reason.clone());
        }

        // §4.F admission rule: throttle/recuperation rejections are reported
        // as hard failures (`ok: false`) per the literal §8 scenarios, which
        // take precedence here over §7's general "gate rejections are
        // ok:true" framing (see DESIGN.md).
        if matches!(engine.breathing.admit(action.priority), Admission::Recuperating) {
            engine.sink.emit(SensorEvent::action(EventLevel::Warn, id.clone(), "recuperating"));
            return Response::failed(
                format!("system recuperating: call to '{id}' rejected"),
                ErrorCategory::GateBlocked,
                "recuperating".to_string(),
            );
        }

        let incoming = payload.or_else(|| action.initial_payload.clone()).unwrap_or_default();

        if action.has_fast_path {
            return dispatch_after_gates(engine, action, incoming, depth).await;
        }

        // §3/§4.A: interval+repeat is a lifecycle schedule, not a call-time
        // gate (§4.H names no such stage and §4.I never reads it) — it is
        // handled as its own branch rather than alongside throttle/debounce.
        if let Some(interval) = action.interval {
            return run_interval_gate(engine, action, incoming, interval, depth);
        }

        if let Some(throttle) = action.throttle {
            return run_throttle_gate(engine, action, incoming, throttle, depth).await;
        }
        if let Some(debounce) = action.debounce {
            return run_debounce_gate(engine, action, incoming, debounce, depth);
        }
        if let Some(buffer) = action.buffer {
            return run_buffer_gate(engine, action, incoming, buffer.window, buffer.strategy, depth);
        }

        dispatch_after_gates(engine, action, incoming, depth).await
    })
}

/// §4.H.3: the first call always passes; a call inside the cooldown window
/// is a hard failure (see DESIGN.md).
async fn run_throttle_gate(
    engine: Arc<EngineInner>,
    action: CompiledAction,
    payload: Payload,
    throttle: Duration,
    depth: u32,
) -> Response {
    let now = engine.clock.now_ms();
    if let Some(last) = action.state.last_exec_time_ms() {
        let elapsed = now.saturating_sub(last);
        let throttle_ms = throttle.as_millis() as u64;
        if elapsed < throttle_ms {
            let remaining = throttle_ms - elapsed;
            engine.sink.emit(SensorEvent::action(EventLevel::Warn, action.id.clone(), "throttle-blocked"));
            return Response::failed(
                format!("throttled, {remaining}ms remaining"),
                ErrorCategory::GateBlocked,
                "throttle".to_string(),
            );
        }
    }
    dispatch_after_gates(engine, action, payload, depth).await
}

/// §4.H.4. On entry: overwrite the buffered payload, cancel+rearm the
/// namespaced debounce timer, and return a provisional response — unless
/// `maxWait` has elapsed, in which case flush synchronously instead.
fn run_debounce_gate(
    engine: Arc<EngineInner>,
    action: CompiledAction,
    payload: Payload,
    debounce: Duration,
    depth: u32,
) -> BoxFuture<'static, Response> {
    Box::pin(async move {
        let now = engine.clock.now_ms();
        engine.buffer_store.set(&action.id, payload.clone());

        if let Some(max_wait) = action.max_wait {
            let start = action.state.debounce_start_ms().unwrap_or(now);
            if now.saturating_sub(start) >= max_wait.as_millis() as u64 {
                engine.timers.forget(&action.id.debounce_timer_id());
                engine.buffer_store.forget(&action.id);
                action.state.clear_debounce_start();
                let flushed = engine.buffer_store.get_single(&action.id).unwrap_or(payload);
                return dispatch_after_gates(engine, action, flushed, depth).await;
            }
        }

        action.state.set_debounce_start_ms(now);

        let timer_engine = engine.clone();
        let timer_action = action.clone();
        let callback: crate::timer::TimerCallback = Arc::new(move || {
            let engine = timer_engine.clone();
            let action = timer_action.clone();
            Box::pin(async move {
                let flushed = engine.buffer_store.get_single(&action.id).unwrap_or_default();
                engine.buffer_store.forget(&action.id);
                action.state.clear_debounce_start();
                let _ = dispatch_after_gates(engine.clone(), action, flushed, depth).await;
            })
        });
        let _ = engine
            .timers
            .keep(debounce, callback, None, Some(action.id.debounce_timer_id()));

        engine.sink.emit(SensorEvent::action(EventLevel::Info, action.id.clone(), "debounce-armed"));
        Response::ok(
            Payload::null(),
            format!("debounced, will execute in {}ms", debounce.as_millis()),
        )
        .with_metadata(ResponseMetadata::for_action(action.id.clone(), action.priority))
    })
}

/// §4.H.5. Collects payloads for `window` ms using `strategy`; arms the
/// namespaced buffer timer once per window.
fn run_buffer_gate(
    engine: Arc<EngineInner>,
    action: CompiledAction,
    payload: Payload,
    window: Duration,
    strategy: BufferStrategy,
    depth: u32,
) -> BoxFuture<'static, Response> {
    Box::pin(async move {
        let already_pending = engine.buffer_store.has_pending(&action.id);
        match strategy {
            BufferStrategy::Overwrite => engine.buffer_store.set(&action.id, payload),
            BufferStrategy::Append => engine.buffer_store.append(&action.id, payload),
        }

        if !already_pending {
            let timer_engine = engine.clone();
            let timer_action = action.clone();
            let callback: crate::timer::TimerCallback = Arc::new(move || {
                let engine = timer_engine.clone();
                let action = timer_action.clone();
                Box::pin(async move {
                    let flushed = match strategy {
                        BufferStrategy::Overwrite => {
                            engine.buffer_store.get_single(&action.id).unwrap_or_default()
                        }
                        BufferStrategy::Append => Payload(Value::Array(
                            engine
                                .buffer_store
                                .get_ordered(&action.id)
                                .into_iter()
                                .map(Payload::into_value)
                                .collect(),
                        )),
                    };
                    engine.buffer_store.forget(&action.id);
                    let _ = dispatch_after_gates(engine.clone(), action, flushed, depth).await;
                })
            });
            let _ = engine
                .timers
                .keep(window, callback, None, Some(action.id.buffer_timer_id()));
        }

        engine.sink.emit(SensorEvent::action(EventLevel::Info, action.id.clone(), "buffer-armed"));
        Response::ok(
            Payload::null(),
            format!("buffered, will execute in {}ms", window.as_millis()),
        )
        .with_metadata(ResponseMetadata::for_action(action.id.clone(), action.priority))
    })
}

/// §3 scheduling fields: arms a recurring timer under `interval-<id>` via the
/// Timer Wheel, which already decrements `repeat` on every firing (see
/// `timer.rs`). `delay`, when set, offsets only the first firing through a
/// one-shot `-delay` pre-timer that arms the real recurring timer when it
/// fires. A call against an already-armed schedule is a no-op `ok: true`
/// response rather than a second schedule.
fn run_interval_gate(
    engine: Arc<EngineInner>,
    action: CompiledAction,
    payload: Payload,
    interval: Duration,
    depth: u32,
) -> BoxFuture<'static, Response> {
    Box::pin(async move {
        let interval_id = action.id.interval_timer_id();
        let delay_id = format!("{interval_id}-delay");
        if engine.timers.meta(&interval_id).is_some() || engine.timers.meta(&delay_id).is_some() {
            return Response::ok(Payload::null(), "interval already scheduled, call ignored")
                .with_metadata(ResponseMetadata::for_action(action.id.clone(), action.priority));
        }

        let repeat = action.repeat;

        if let Some(delay) = action.delay {
            let recurring_engine = engine.clone();
            let recurring_action = action.clone();
            let recurring_payload = payload.clone();
            let recurring_id = interval_id.clone();
            let arm_recurring: TimerCallback = Arc::new(move || {
                let engine = recurring_engine.clone();
                let action = recurring_action.clone();
                let payload = recurring_payload.clone();
                let id = recurring_id.clone();
                Box::pin(async move {
                    let callback = dispatch_callback(engine.clone(), action, payload, depth);
                    let _ = engine.timers.keep(interval, callback, repeat, Some(id));
                })
            });
            let _ = engine.timers.keep(delay, arm_recurring, None, Some(delay_id));
            engine.sink.emit(SensorEvent::action(EventLevel::Info, action.id.clone(), "interval-delay-armed"));
            return Response::ok(
                Payload::null(),
                format!("interval scheduled, first firing after {}ms delay", delay.as_millis()),
            )
            .with_metadata(ResponseMetadata::for_action(action.id.clone(), action.priority));
        }

        let callback = dispatch_callback(engine.clone(), action.clone(), payload, depth);
        let _ = engine.timers.keep(interval, callback, repeat, Some(interval_id));

        engine.sink.emit(SensorEvent::action(EventLevel::Info, action.id.clone(), "interval-armed"));
        Response::ok(
            Payload::null(),
            format!("interval scheduled, every {}ms", interval.as_millis()),
        )
        .with_metadata(ResponseMetadata::for_action(action.id.clone(), action.priority))
    })
}

fn dispatch_callback(
    engine: Arc<EngineInner>,
    action: CompiledAction,
    payload: Payload,
    depth: u32,
) -> TimerCallback {
    Arc::new(move || {
        let engine = engine.clone();
        let action = action.clone();
        let payload = payload.clone();
        Box::pin(async move {
            let _ = dispatch_after_gates(engine, action, payload, depth).await;
        })
    })
}

/// §4.I steps 5-7: the compiled tail stages, the handler, the payload-store
/// commit and intra-link follow-through.
async fn dispatch_after_gates(
    engine: Arc<EngineInner>,
    action: CompiledAction,
    payload: Payload,
    depth: u32,
) -> Response {
    let payload = match pipeline::run_tail(&action, &engine.payload_store, payload) {
        TailOutcome::ShortCircuit(response) => return *response,
        TailOutcome::Continue(payload) => payload,
    };

    let Some(handler) = engine.subscribers.get(&action.id) else {
        return Response::failed(
            format!("no handler registered for '{}'", action.id),
            ErrorCategory::NotRegistered,
            action.id.to_string(),
        );
    };

    let outcome = invoker::invoke(&action, &handler, payload.clone(), &engine.clock, &engine.sink).await;
    engine.system_metrics.record_call();

    if !outcome.ok {
        engine.system_metrics.record_error();
        let (category, detail) = outcome.error.unwrap_or((ErrorCategory::HandlerError, String::new()));
        return Response::failed(outcome.message, category, detail);
    }

    engine.payload_store.commit(&action.id, payload);

    if let Some((link_id, link_payload)) = recognize_intra_link(&outcome.payload) {
        let linked = call_with_depth(engine.clone(), link_id, Some(link_payload), depth + 1).await;
        if !linked.ok {
            engine.sink.emit(SensorEvent::action(EventLevel::Warn, action.id.clone(), "intra-link-failed"));
            return linked;
        }
    }

    Response::ok(outcome.payload, outcome.message)
        .with_metadata(ResponseMetadata::for_action(action.id, action.priority))
}

/// §9: recognizes the `{ id, payload }` shape structurally, matching the
/// spec's stated current behavior (see DESIGN.md for the tagged-variant
/// alternative this was weighed against).
fn recognize_intra_link(payload: &Payload) -> Option<(ActionId, Payload)> {
    let object = payload.0.as_object()?;
    if object.len() != 2 {
        return None;
    }
    let id = object.get("id")?.as_str()?;
    let link_payload = object.get("payload")?;
    Some((ActionId::new(id.to_string()), Payload::from_value(link_payload.clone())))
}
