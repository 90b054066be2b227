//! The tail protection stages: schema, condition, selector, transform and
//! change-detection (spec.md §4.H.6-10). Each is a pure function of the
//! action and the current payload — no stage here captures the action in a
//! closure, avoiding the cyclic action/pipeline structure §9 warns about.

use crate::action::CompiledAction;
use crate::error::ErrorCategory;
use crate::payload_store::PayloadStore;
use crate::response::Response;
use crate::types::Payload;

use super::{TailOutcome, TailStageKind};

pub fn apply(
    stage: TailStageKind,
    action: &CompiledAction,
    payload_store: &PayloadStore,
    payload: Payload,
) -> TailOutcome {
    match stage {
        TailStageKind::Schema => schema(action, payload),
        TailStageKind::Condition => condition(action, payload),
        TailStageKind::Selector => selector(action, payload),
        TailStageKind::Transform => transform(action, payload),
        TailStageKind::ChangeDetection => change_detection(action, payload_store, payload),
    }
}

fn schema(action: &CompiledAction, payload: Payload) -> TailOutcome {
    let Some(validator) = &action.schema else {
        return TailOutcome::Continue(payload);
    };
    match validator.validate(&payload) {
        Ok(()) => TailOutcome::Continue(payload),
        Err(reason) => TailOutcome::ShortCircuit(Box::new(Response::failed(
            format!("schema validation failed: {reason}"),
            ErrorCategory::ValidationFailed,
            reason,
        ))),
    }
}

fn condition(action: &CompiledAction, payload: Payload) -> TailOutcome {
    let Some(predicate) = &action.condition else {
        return TailOutcome::Continue(payload);
    };
    if predicate.check(&payload) {
        TailOutcome::Continue(payload)
    } else {
        // §4.H.7: "OK = true, no execution" — condition-false is policy, not
        // a failure.
        TailOutcome::ShortCircuit(Box::new(Response::ok(payload, "condition not satisfied")))
    }
}

fn selector(action: &CompiledAction, payload: Payload) -> TailOutcome {
    match &action.selector {
        Some(selector) => TailOutcome::Continue(selector.select(payload)),
        None => TailOutcome::Continue(payload),
    }
}

fn transform(action: &CompiledAction, payload: Payload) -> TailOutcome {
    match &action.transform {
        Some(transform) => TailOutcome::Continue(transform.transform(payload)),
        None => TailOutcome::Continue(payload),
    }
}

fn change_detection(
    action: &CompiledAction,
    payload_store: &PayloadStore,
    payload: Payload,
) -> TailOutcome {
    if !payload_store.has_changed(&action.id, &payload) {
        // §4.H.10: "OK = true" — unchanged payloads are skipped, not failed.
        return TailOutcome::ShortCircuit(Box::new(Response::ok(payload, "no change, skipped")));
    }
    TailOutcome::Continue(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionConfig;
    use serde_json::json;

    #[test]
    fn condition_false_short_circuits_ok_true() {
        let action = ActionConfig::new("cond")
            .condition(|p: &Payload| p.0.as_i64() == Some(1))
            .compile()
            .unwrap();
        let store = PayloadStore::new();
        match apply(TailStageKind::Condition, &action, &store, Payload::from(json!(2))) {
            TailOutcome::ShortCircuit(response) => assert!(response.ok),
            TailOutcome::Continue(_) => panic!("expected short circuit"),
        }
    }

    #[test]
    fn schema_failure_is_validation_failed() {
        let action = ActionConfig::new("schema")
            .schema(|p: &Payload| {
                if p.0.is_string() {
                    Ok(())
                } else {
                    Err("expected a string".to_string())
                }
            })
            .compile()
            .unwrap();
        let store = PayloadStore::new();
        match apply(TailStageKind::Schema, &action, &store, Payload::from(json!(42))) {
            TailOutcome::ShortCircuit(response) => {
                assert!(!response.ok);
                assert_eq!(
                    response.error.as_ref().unwrap().category,
                    ErrorCategory::ValidationFailed
                );
            }
            TailOutcome::Continue(_) => panic!("expected short circuit"),
        }
    }
}
