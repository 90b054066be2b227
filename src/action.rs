//! Action configuration, registration-time validation and the compiled,
//! per-channel runtime state (spec.md §3, §4.G).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{CyreError, CyreResult};
use crate::metrics::ChannelMetrics;
use crate::pipeline::TailStageKind;
use crate::types::{ActionId, ActionPath, BufferSpec, Payload, Priority, Repeat};

/// Validates a payload at the schema stage (§4.H.6). `Err` carries the
/// rejection reason surfaced in the response's structured error.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, payload: &Payload) -> Result<(), String>;
}

impl<F> SchemaValidator for F
where
    F: Fn(&Payload) -> Result<(), String> + Send + Sync,
{
    fn validate(&self, payload: &Payload) -> Result<(), String> {
        (self)(payload)
    }
}

/// Boolean predicate at the condition stage (§4.H.7).
pub trait Condition: Send + Sync {
    fn check(&self, payload: &Payload) -> bool;
}

impl<F> Condition for F
where
    F: Fn(&Payload) -> bool + Send + Sync,
{
    fn check(&self, payload: &Payload) -> bool {
        (self)(payload)
    }
}

/// Pure projection at the selector stage (§4.H.8).
pub trait Selector: Send + Sync {
    fn select(&self, payload: Payload) -> Payload;
}

impl<F> Selector for F
where
    F: Fn(Payload) -> Payload + Send + Sync,
{
    fn select(&self, payload: Payload) -> Payload {
        (self)(payload)
    }
}

/// Pure mapping at the transform stage (§4.H.9).
pub trait Transform: Send + Sync {
    fn transform(&self, payload: Payload) -> Payload;
}

impl<F> Transform for F
where
    F: Fn(Payload) -> Payload + Send + Sync,
{
    fn transform(&self, payload: Payload) -> Payload {
        (self)(payload)
    }
}

/// Builder for an action's registration-time config (§3 "Channel (Action)
/// entity"). Consumed by [`ActionConfig::compile`].
#[derive(Clone)]
pub struct ActionConfig {
    id: ActionId,
    path: Option<ActionPath>,
    throttle: Option<Duration>,
    debounce: Option<Duration>,
    max_wait: Option<Duration>,
    buffer: Option<BufferSpec>,
    interval: Option<Duration>,
    repeat: Option<Repeat>,
    delay: Option<Duration>,
    schema: Option<Arc<dyn SchemaValidator>>,
    required: bool,
    condition: Option<Arc<dyn Condition>>,
    selector: Option<Arc<dyn Selector>>,
    transform: Option<Arc<dyn Transform>>,
    detect_changes: bool,
    priority: Priority,
    block: bool,
    timeout: Option<Duration>,
    initial_payload: Option<Payload>,
}

impl ActionConfig {
    pub fn new(id: impl Into<ActionId>) -> Self {
        Self {
            id: id.into(),
            path: None,
            throttle: None,
            debounce: None,
            max_wait: None,
            buffer: None,
            interval: None,
            repeat: None,
            delay: None,
            schema: None,
            required: false,
            condition: None,
            selector: None,
            transform: None,
            detect_changes: false,
            priority: Priority::default(),
            block: false,
            timeout: None,
            initial_payload: None,
        }
    }

    pub fn path(mut self, path: impl Into<ActionPath>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn throttle(mut self, duration: Duration) -> Self {
        self.throttle = Some(duration);
        self
    }

    pub fn debounce(mut self, duration: Duration) -> Self {
        self.debounce = Some(duration);
        self
    }

    pub fn max_wait(mut self, duration: Duration) -> Self {
        self.max_wait = Some(duration);
        self
    }

    pub fn buffer(mut self, spec: BufferSpec) -> Self {
        self.buffer = Some(spec);
        self
    }

    pub fn interval(mut self, duration: Duration) -> Self {
        self.interval = Some(duration);
        self
    }

    pub fn repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = Some(repeat);
        self
    }

    pub fn delay(mut self, duration: Duration) -> Self {
        self.delay = Some(duration);
        self
    }

    pub fn schema(mut self, schema: impl SchemaValidator + 'static) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn condition(mut self, condition: impl Condition + 'static) -> Self {
        self.condition = Some(Arc::new(condition));
        self
    }

    pub fn selector(mut self, selector: impl Selector + 'static) -> Self {
        self.selector = Some(Arc::new(selector));
        self
    }

    pub fn transform(mut self, transform: impl Transform + 'static) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    pub fn detect_changes(mut self, detect_changes: bool) -> Self {
        self.detect_changes = detect_changes;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn block(mut self, block: bool) -> Self {
        self.block = block;
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    pub fn payload(mut self, payload: impl Into<Payload>) -> Self {
        self.initial_payload = Some(payload.into());
        self
    }

    /// §4.G registration-time validation: reject (no insert, `action` fails),
    /// block (insert with `_isBlocked`, calls refused), or accept.
    pub fn compile(self) -> CyreResult<CompiledAction> {
        if self.id.is_empty() {
            return Err(CyreError::ConfigRejected {
                id: String::new(),
                reason: "action id must not be empty".into(),
            });
        }
        if self.required && self.initial_payload.as_ref().is_none_or(Payload::is_nullish) {
            return Err(CyreError::ConfigRejected {
                id: self.id.as_str().to_string(),
                reason: "required=true but no non-nullish initial payload was provided".into(),
            });
        }

        let mut block_reason = None;
        let mut repeat_zero_blocked = false;
        if self.block {
            block_reason = Some("action registered with block=true".to_string());
        } else if matches!(self.repeat, Some(r) if r.is_zero()) {
            block_reason = Some("repeat=0: action is registered but never executable".to_string());
            repeat_zero_blocked = true;
        } else if self.throttle.is_some() && self.debounce.is_some() {
            block_reason = Some("throttle and debounce are mutually exclusive".to_string());
        } else if self.interval.is_some() && self.repeat.is_none() {
            block_reason = Some("interval requires repeat".to_string());
        } else if self.max_wait.is_some() && self.debounce.is_none() {
            block_reason = Some("maxWait requires debounce".to_string());
        }

        let tail_pipeline = crate::pipeline::compile_tail(&self);
        let has_fast_path = block_reason.is_none()
            && self.throttle.is_none()
            && self.debounce.is_none()
            && self.buffer.is_none()
            && self.interval.is_none()
            && tail_pipeline.is_empty();

        Ok(CompiledAction {
            id: self.id,
            path: self.path,
            throttle: self.throttle,
            debounce: self.debounce,
            max_wait: self.max_wait,
            buffer: self.buffer,
            interval: self.interval,
            repeat: self.repeat,
            delay: self.delay,
            schema: self.schema,
            required: self.required,
            condition: self.condition,
            selector: self.selector,
            transform: self.transform,
            detect_changes: self.detect_changes,
            priority: self.priority,
            timeout: self.timeout,
            initial_payload: self.initial_payload,
            block_reason,
            repeat_zero_blocked,
            has_fast_path,
            tail_pipeline: Arc::from(tail_pipeline),
            state: Arc::new(ActionState::default()),
        })
    }

    pub(crate) fn has_schema(&self) -> bool {
        self.schema.is_some()
    }
    pub(crate) fn has_condition(&self) -> bool {
        self.condition.is_some()
    }
    pub(crate) fn has_selector(&self) -> bool {
        self.selector.is_some()
    }
    pub(crate) fn has_transform(&self) -> bool {
        self.transform.is_some()
    }
    pub(crate) fn detects_changes(&self) -> bool {
        self.detect_changes
    }
}

/// Runtime-mutated fields (§3 "Derived (set by compiler, invisible to
/// users)"): `_lastExecTime` and `_debounceStart`, plus the per-channel
/// metrics counters. Held behind an `Arc` so cloning a [`CompiledAction`] out
/// of the registry shares the same mutable state every caller observes.
pub struct ActionState {
    last_exec_time_ms: AtomicU64,
    debounce_start_ms: AtomicU64,
    pub metrics: Arc<ChannelMetrics>,
}

const UNSET: u64 = u64::MAX;

impl Default for ActionState {
    fn default() -> Self {
        Self {
            last_exec_time_ms: AtomicU64::new(UNSET),
            debounce_start_ms: AtomicU64::new(UNSET),
            metrics: Arc::new(ChannelMetrics::default()),
        }
    }
}

impl ActionState {
    /// `None` means the action has never executed — distinct from having
    /// executed at timestamp `0` on a clock that starts at zero.
    pub fn last_exec_time_ms(&self) -> Option<u64> {
        match self.last_exec_time_ms.load(Ordering::Relaxed) {
            UNSET => None,
            ms => Some(ms),
        }
    }

    pub fn set_last_exec_time_ms(&self, at: u64) {
        self.last_exec_time_ms.store(at, Ordering::Relaxed);
    }

    pub fn debounce_start_ms(&self) -> Option<u64> {
        match self.debounce_start_ms.load(Ordering::Relaxed) {
            UNSET => None,
            ms => Some(ms),
        }
    }

    pub fn set_debounce_start_ms(&self, at: u64) {
        let _ = self
            .debounce_start_ms
            .compare_exchange(UNSET, at, Ordering::Relaxed, Ordering::Relaxed);
    }

    pub fn clear_debounce_start(&self) {
        self.debounce_start_ms.store(UNSET, Ordering::Relaxed);
    }
}

/// The action as stored in the Registry: immutable config plus shared
/// runtime state. Cheap to clone — every field is either `Copy`, an `Arc`, or
/// small owned data.
#[derive(Clone)]
pub struct CompiledAction {
    pub id: ActionId,
    pub path: Option<ActionPath>,
    pub throttle: Option<Duration>,
    pub debounce: Option<Duration>,
    pub max_wait: Option<Duration>,
    pub buffer: Option<BufferSpec>,
    pub interval: Option<Duration>,
    pub repeat: Option<Repeat>,
    pub delay: Option<Duration>,
    pub schema: Option<Arc<dyn SchemaValidator>>,
    pub required: bool,
    pub condition: Option<Arc<dyn Condition>>,
    pub selector: Option<Arc<dyn Selector>>,
    pub transform: Option<Arc<dyn Transform>>,
    pub detect_changes: bool,
    pub priority: Priority,
    pub timeout: Option<Duration>,
    pub initial_payload: Option<Payload>,
    pub block_reason: Option<String>,
    /// True when `block_reason` is specifically the repeat=0 case (§4.H.2):
    /// distinguishes the one blocking reason that is an `ok: true`
    /// short-circuit (§7 category 4, GateBlocked) from every other blocking
    /// reason, which is a hard `ConfigBlocked` failure.
    pub repeat_zero_blocked: bool,
    pub has_fast_path: bool,
    pub tail_pipeline: Arc<[TailStageKind]>,
    pub state: Arc<ActionState>,
}

impl CompiledAction {
    pub fn is_blocked(&self) -> bool {
        self.block_reason.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_without_payload_is_rejected() {
        let err = ActionConfig::new("r").required(true).compile().unwrap_err();
        assert!(matches!(err, CyreError::ConfigRejected { .. }));
    }

    #[test]
    fn throttle_and_debounce_together_blocks_not_rejects() {
        let action = ActionConfig::new("td")
            .throttle(Duration::from_millis(10))
            .debounce(Duration::from_millis(10))
            .compile()
            .unwrap();
        assert!(action.is_blocked());
    }

    #[test]
    fn empty_id_is_rejected() {
        let err = ActionConfig::new("").compile().unwrap_err();
        assert!(matches!(err, CyreError::ConfigRejected { .. }));
    }

    #[test]
    fn bare_action_gets_fast_path() {
        let action = ActionConfig::new("fp").compile().unwrap();
        assert!(action.has_fast_path);
    }

    #[test]
    fn throttle_disables_fast_path() {
        let action = ActionConfig::new("th")
            .throttle(Duration::from_millis(100))
            .compile()
            .unwrap();
        assert!(!action.has_fast_path);
    }
}
