//! Shared value types used across the engine: channel identity, payload
//! representation, scheduling knobs and priority.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

/// Identity of a channel (called "Action" in `spec.md` §3). Cheap to clone —
/// every component that needs to reference a channel by name holds one of
/// these rather than a borrowed `&str`, since timers and buffered state can
/// outlive the call that created them.
#[derive(Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ActionId(Arc<str>);

impl ActionId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Namespaced timer id for this channel's debounce timer (§4.B).
    pub fn debounce_timer_id(&self) -> String {
        format!("debounce-{}", self.0)
    }

    /// Namespaced timer id for this channel's buffer-window timer (§4.B).
    pub fn buffer_timer_id(&self) -> String {
        format!("buffer-{}", self.0)
    }

    /// Namespaced timer id for this channel's interval/repeat schedule
    /// (§4.B, §3 scheduling fields). The one-shot `delay` pre-timer, when
    /// present, uses this id with a `-delay` suffix.
    pub fn interval_timer_id(&self) -> String {
        format!("interval-{}", self.0)
    }
}

impl fmt::Debug for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionId({:?})", self.0)
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ActionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ActionId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// The payload that flows through a channel. Backed by [`serde_json::Value`]
/// so that schema/condition/selector/transform hooks and the persistence
/// snapshot collaborator (§6) can all operate on a single, serializable,
/// structurally-comparable representation instead of a bespoke `dyn Any`.
///
/// `serde_json::Value`'s `PartialEq` gives us exactly the equality spec.md
/// §4.C asks for: order-insensitive for objects (backed by a `BTreeMap`),
/// order-sensitive for arrays.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Payload(pub Value);

impl Payload {
    pub const fn null() -> Self {
        Self(Value::Null)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self.0, Value::Null)
    }

    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> From<T> for Payload
where
    Value: From<T>,
{
    fn from(value: T) -> Self {
        Self(Value::from(value))
    }
}

/// Dispatch priority (§3). Ordered so the recuperation gate can test
/// `priority < Priority::Critical` to decide admission.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub enum Priority {
    Background,
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn is_critical(self) -> bool {
        matches!(self, Priority::Critical)
    }
}

/// Strategy used by the buffer-window gate (§3, §4.H.5).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub enum BufferStrategy {
    #[default]
    Overwrite,
    Append,
}

/// How many times a periodic action should fire (§3 scheduling fields).
///
/// `Count(0)` is the "registered but never executable" marker the spec calls
/// out explicitly (§3 invariant 1, §4.H.2): the repeat-zero gate short
/// circuits every call against such a channel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Repeat {
    Count(u64),
    Infinite,
}

impl Repeat {
    pub fn is_zero(self) -> bool {
        matches!(self, Repeat::Count(0))
    }

    /// Given the firings-remaining count that was active for the firing that
    /// just happened, returns the count to use for the next iteration, or
    /// `None` if that firing was the last one.
    pub fn decrement(self) -> Option<Repeat> {
        match self {
            Repeat::Infinite => Some(Repeat::Infinite),
            Repeat::Count(0) | Repeat::Count(1) => None,
            Repeat::Count(n) => Some(Repeat::Count(n - 1)),
        }
    }
}

/// Buffer-window configuration (§3).
#[derive(Clone, Copy, Debug)]
pub struct BufferSpec {
    pub window: Duration,
    pub strategy: BufferStrategy,
}

/// A hierarchical `/`-separated locator used for the registry's prefix index
/// (§3 Policy, §4.B).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ActionPath(Arc<str>);

impl From<&str> for ActionPath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ActionPath {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl ActionPath {
    pub fn new(path: impl Into<Arc<str>>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// True if `self` is `other` or a descendant of `other` in the `/`
    /// hierarchy (used by the registry's O(depth) prefix traversal, §4.B).
    pub fn starts_with(&self, other: &ActionPath) -> bool {
        let mut mine = self.segments();
        for seg in other.segments() {
            match mine.next() {
                Some(m) if m == seg => continue,
                _ => return false,
            }
        }
        true
    }
}
