//! The Pipeline Compiler and the stages it orders (spec.md §4.G, §4.H).
//!
//! The canonical order from §3 invariant 3 is
//! `recuperation → repeat-zero → throttle → debounce → schema → condition →
//! selector → transform → change-detection`. The first five of those
//! (recuperation, repeat-zero, throttle, debounce/buffer) are *gate* stages:
//! they need no payload transformation but may arm a timer and return a
//! provisional response, so the Call Dispatcher runs them directly rather
//! than through this module (§4.I steps 2 and 4). What this module compiles
//! and runs is the *tail*: schema → condition → selector → transform →
//! change-detection, the stages that only ever transform a payload or
//! short-circuit outright (§9 "compose them right-to-left... or iterate an
//! index at call time" — this crate iterates).

pub mod stages;

use crate::action::{ActionConfig, CompiledAction};
use crate::payload_store::PayloadStore;
use crate::response::Response;
use crate::types::Payload;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TailStageKind {
    Schema,
    Condition,
    Selector,
    Transform,
    ChangeDetection,
}

/// Built at registration time by [`ActionConfig::compile`] (§4.G): only the
/// stages a concrete config actually needs are present.
pub fn compile_tail(config: &ActionConfig) -> Vec<TailStageKind> {
    let mut stages = Vec::new();
    if config.has_schema() {
        stages.push(TailStageKind::Schema);
    }
    if config.has_condition() {
        stages.push(TailStageKind::Condition);
    }
    if config.has_selector() {
        stages.push(TailStageKind::Selector);
    }
    if config.has_transform() {
        stages.push(TailStageKind::Transform);
    }
    if config.detects_changes() {
        stages.push(TailStageKind::ChangeDetection);
    }
    stages
}

pub enum TailOutcome {
    Continue(Payload),
    ShortCircuit(Box<Response>),
}

/// Runs the compiled tail stages in order against `payload`, stopping at the
/// first short-circuit (§4.I step 5: "Any short-circuit response is returned
/// unchanged").
pub fn run_tail(action: &CompiledAction, payload_store: &PayloadStore, payload: Payload) -> TailOutcome {
    let mut current = payload;
    for stage in action.tail_pipeline.iter() {
        match stages::apply(*stage, action, payload_store, current) {
            TailOutcome::Continue(next) => current = next,
            short_circuit @ TailOutcome::ShortCircuit(_) => return short_circuit,
        }
    }
    TailOutcome::Continue(current)
}
